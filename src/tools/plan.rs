//! Plan tools: `plan_read` and `plan_write`.
//!
//! Both are [`ToolKind::Plan`](super::ToolKind::Plan) tools. The orchestrator
//! resolves the conversation's plan, injects it into the [`ToolInput`], and
//! persists it after the call.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;

use super::{ToolCallResult, ToolDefinition, ToolError, ToolInput};
use crate::store::{Plan, Step, StepStatus};

/// Name of the plan rendering tool
pub const PLAN_READ: &str = "plan_read";
/// Name of the plan editing tool
pub const PLAN_WRITE: &str = "plan_write";

/// Mutation requested through `plan_write`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    /// Update the status of one step
    SetStatus,
    /// Append new steps
    AddSteps,
    /// Delete steps by id
    RemoveSteps,
    /// Replace the step order
    ReorderSteps,
}

/// A step supplied to `add_steps`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStepInput {
    /// Step id
    #[serde(default)]
    pub id: String,
    /// What the step does
    #[serde(default)]
    pub description: String,
    /// Conditions that mark the step done
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
}

/// Input of `plan_write`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWriteInput {
    /// Requested mutation
    #[serde(rename = "write_action", alias = "action")]
    pub action: String,
    /// Target step of `set_status`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step_id: String,
    /// New status for `set_status`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    /// Steps for `add_steps`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps_to_add: Vec<PlanStepInput>,
    /// Ids for `remove_steps` and `reorder_steps`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_ids: Vec<String>,
}

impl PlanWriteInput {
    fn write_action(&self) -> Option<WriteAction> {
        serde_json::from_value(serde_json::Value::String(self.action.clone())).ok()
    }
}

/// Tool rendering the current plan
pub fn plan_read_tool() -> ToolDefinition {
    ToolDefinition::new(
        PLAN_READ,
        "Read the current plan of this conversation, including the status of every step.",
        json!({ "type": "object", "properties": {} }),
        plan_read,
    )
    .plan_tool()
}

/// Tool editing the current plan
pub fn plan_write_tool() -> ToolDefinition {
    ToolDefinition::new(
        PLAN_WRITE,
        "Modify the plan of this conversation: add, remove or reorder steps, or set the status of a step.",
        json!({
            "type": "object",
            "properties": {
                "write_action": {
                    "type": "string",
                    "enum": ["set_status", "add_steps", "remove_steps", "reorder_steps"],
                    "description": "The change to apply to the plan."
                },
                "step_id": {
                    "type": "string",
                    "description": "Step to update (set_status)."
                },
                "status": {
                    "type": "string",
                    "enum": ["TODO", "DONE"],
                    "description": "New status of the step (set_status)."
                },
                "steps_to_add": {
                    "type": "array",
                    "description": "Steps to append (add_steps).",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "description": { "type": "string" },
                            "acceptance_criteria": {
                                "type": "array",
                                "items": { "type": "string" }
                            }
                        },
                        "required": ["id", "description"]
                    }
                },
                "step_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Steps to remove (remove_steps) or the full new order (reorder_steps)."
                }
            },
            "required": ["write_action"]
        }),
        plan_write,
    )
    .plan_tool()
}

/// Render a plan as the text returned by `plan_read`.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = format!("Plan '{}'", plan.id);
    if plan.steps.is_empty() {
        out.push_str(": no steps");
        return out;
    }

    for (i, step) in plan.steps.iter().enumerate() {
        let _ = write!(out, "\n{}. [{}] {}: {}", i + 1, step.status, step.id, step.description);
        for criterion in &step.acceptance_criteria {
            let _ = write!(out, "\n   - {}", criterion);
        }
    }
    out
}

fn plan_read(mut input: ToolInput<'_>) -> ToolCallResult<String> {
    Ok(render_plan(input.plan_mut()?))
}

fn plan_write(mut input: ToolInput<'_>) -> ToolCallResult<String> {
    let args: PlanWriteInput = input.decode()?;
    let plan = input.plan_mut()?;

    match args.write_action() {
        Some(WriteAction::AddSteps) => add_steps(plan, args.steps_to_add),
        Some(WriteAction::RemoveSteps) => {
            let removed = plan.remove_steps(&args.step_ids);
            Ok(format!("Removed {} steps from plan '{}'", removed, plan.id))
        }
        Some(WriteAction::ReorderSteps) => {
            plan.reorder_steps(&args.step_ids).map_err(ToolError::Execution)?;
            Ok(format!("Reordered steps in plan '{}'", plan.id))
        }
        Some(WriteAction::SetStatus) => {
            if args.step_id.is_empty() {
                return Err(ToolError::execution("'set_status' requires 'step_id'"));
            }
            let status: StepStatus = args.status.parse().map_err(ToolError::Execution)?;
            plan.set_status(&args.step_id, status).map_err(ToolError::Execution)?;
            Ok(format!(
                "Step '{}' in plan '{}' set to {}",
                args.step_id, plan.id, status
            ))
        }
        None => Err(ToolError::execution(format!("unknown action '{}'", args.action))),
    }
}

/// Validate every step before touching the plan so a bad batch adds nothing.
fn add_steps(plan: &mut Plan, steps: Vec<PlanStepInput>) -> ToolCallResult<String> {
    for (i, step) in steps.iter().enumerate() {
        if step.id.is_empty() {
            return Err(ToolError::execution(format!("missing 'id' in step at index {}", i)));
        }
        if step.description.is_empty() {
            return Err(ToolError::execution(format!(
                "missing 'description' in step at index {}",
                i
            )));
        }
    }

    let count = steps.len();
    for step in steps {
        plan.add_step(Step {
            id: step.id,
            description: step.description,
            status: StepStatus::Todo,
            acceptance_criteria: step.acceptance_criteria,
        });
    }
    Ok(format!("Added {} steps to plan '{}'", count, plan.id))
}
