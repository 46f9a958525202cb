//! Markdown session log for agent turns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Logger for agent turns.
///
/// This logger creates markdown-formatted log files tracking each turn: the
/// user input, model responses, tool executions, and errors.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let mut dir = std::env::temp_dir();
                dir.push("atk-logs");
                let filename = format!(
                    "session_{}_{}.md",
                    Utc::now().timestamp_millis(),
                    std::process::id()
                );
                dir.join(filename)
            }
        };

        let log_level = log_level.unwrap_or("INFO").to_uppercase();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level,
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    /// Initialize the log file with header.
    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Agent Session Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    /// Append content to log file.
    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    fn is_debug(&self) -> bool {
        self.log_level == "DEBUG"
    }

    /// Log the start of a turn.
    ///
    /// # Arguments
    /// * `conversation_id` - Conversation the turn belongs to.
    /// * `user_input` - Text the user sent.
    pub fn log_turn_start(&self, conversation_id: &str, user_input: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Turn Started - {}\n\n**Conversation:** {}\n\n**Input:**\n```\n{}\n```\n\n",
            now.to_rfc3339(),
            conversation_id,
            user_input
        );

        self.append_to_log(&content)
    }

    /// Log an LLM response.
    ///
    /// Empty responses are skipped.
    ///
    /// # Arguments
    /// * `response` - Text of the response.
    /// * `model` - Model name used.
    pub fn log_llm_response(&self, response: &str, model: Option<&str>) -> Result<()> {
        if response.trim().is_empty() {
            debug!("skipping log entry for empty LLM response");
            return Ok(());
        }

        let model = model.unwrap_or("unknown");
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### LLM Response - {}\n\n**Model:** {}\n\n**Response:**\n```\n{}\n```\n\n",
            now.to_rfc3339(),
            model,
            response
        );

        self.append_to_log(&content)
    }

    /// Log tool execution with its result.
    ///
    /// Arguments are only written at DEBUG level.
    ///
    /// # Arguments
    /// * `tool_name` - Name of the tool executed.
    /// * `tool_args` - Arguments passed to the tool.
    /// * `result` - Tool output or error text.
    /// * `success` - Whether the tool execution was successful.
    pub fn log_tool_execution(
        &self,
        tool_name: &str,
        tool_args: &str,
        result: &str,
        success: bool,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let status = if success { "Result" } else { "Error" };

        let args = if self.is_debug() {
            format!("**Args:** {}\n", tool_args)
        } else {
            String::new()
        };
        let content = format!(
            "### Tool Execution - {}\n\n**Tool:** {}\n{}**{}:** {}\n\n",
            now.to_rfc3339(),
            tool_name,
            args,
            status,
            result
        );

        self.append_to_log(&content)
    }

    /// Log the end of a turn.
    ///
    /// # Arguments
    /// * `conversation_id` - Conversation the turn belongs to.
    /// * `token_count` - Token count reported by the provider.
    pub fn log_turn_complete(&self, conversation_id: &str, token_count: usize) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Turn Completed - {}\n\n**Conversation:** {}\n**Tokens:** {}\n\n---\n\n",
            now.to_rfc3339(),
            conversation_id,
            token_count
        );

        self.append_to_log(&content)
    }

    /// Log error with context.
    ///
    /// # Arguments
    /// * `error` - Error message.
    /// * `context` - Additional context information.
    pub fn log_error(
        &self,
        error: &str,
        context: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### Error - {}\n\n**Error:** {}\n\n",
            now.to_rfc3339(),
            error
        );

        if let Some(ctx) = context {
            content.push_str(&format!(
                "**Context:** {}\n\n",
                serde_json::to_string_pretty(ctx).unwrap_or_default()
            ));
        }

        self.append_to_log(&content)?;
        error!(error, "turn error logged");
        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}
