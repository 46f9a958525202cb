//! Integration tests for the turn loop
//!
//! Drives `Agent::run` with a scripted LLM client, a recording store and the
//! built-in tools.

mod common;

use common::{
    assistant_text, assistant_tool_uses, McpReply, MockMcpServer, RecordingStore, ScriptedLlm,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use atk::agent::{Agent, AgentConfig, TurnState};
use atk::error::AgentError;
use atk::inference::LlmError;
use atk::mcp::McpProxy;
use atk::message::{ContentBlock, Message, Role, ToolResult};
use atk::state::StateController;
use atk::store::{Conversation, Store};
use atk::tools::builtin_registry;
use atk::CancellationToken;

fn agent_with(llm: ScriptedLlm, store: &RecordingStore) -> Agent {
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_registry(builtin_registry().unwrap());
    Agent::new(config)
}

fn tool_results(msg: &Message) -> Vec<&ToolResult> {
    msg.content.iter().filter_map(ContentBlock::as_tool_result).collect()
}

#[tokio::test]
async fn test_list_files_turn() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("b.txt"), "b").unwrap();
    let path = dir.path().to_string_lossy().to_string();

    let llm = ScriptedLlm::replying(vec![
        assistant_tool_uses(&[("call_1", "list_files", json!({ "path": path }))]),
        assistant_text("There are two files."),
    ]);
    let record = llm.record.clone();
    let store = RecordingStore::new();
    let controller = StateController::new();
    let mut updates = controller.subscribe().unwrap();

    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_registry(builtin_registry().unwrap())
        .with_controller(controller);
    let mut agent = Agent::new(config);

    let mut deltas = Vec::new();
    agent
        .run(&CancellationToken::new(), "what files are here?", &mut |d: &str| {
            deltas.push(d.to_string())
        })
        .await
        .unwrap();

    let messages = &agent.conversation().messages;
    assert_eq!(messages.len(), 4);
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    for (i, msg) in messages.iter().enumerate() {
        assert_eq!(msg.sequence(), i);
    }

    let results = tool_results(&messages[2]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_use_id, "call_1");
    assert_eq!(results[0].tool_name, "list_files");
    assert!(!results[0].is_error);
    assert!(results[0].content.contains("a.txt"));
    assert!(results[0].content.contains("b.txt"));

    let joined = deltas.concat();
    assert!(joined.contains(&format!("✓ List {}\n", path)));
    assert!(joined.contains("There are two files."));

    assert_eq!(agent.state(), TurnState::Done);
    assert_eq!(agent.token_count(), 42);
    assert_eq!(store.writes(), vec!["save_conversation", "update_token_count:42"]);

    let stored = store.inner.get_conversation(&agent.conversation().id).await.unwrap();
    assert_eq!(stored.messages.len(), 4);
    assert_eq!(stored.token_count, 42);

    // Native history saw the same four messages, and the model got the tools
    let record = record.lock().unwrap();
    assert_eq!(record.native.len(), 4);
    assert!(record.history_calls.is_empty());
    assert_eq!(record.tools.len(), 5);
    assert_eq!(record.streaming, vec![true, true]);
    drop(record);

    let update = tokio::time::timeout(Duration::from_secs(1), updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.token_count, Some(42));
    assert!(update.plan.is_none());
}

#[tokio::test]
async fn test_tool_uses_answered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();
    let missing = dir.path().join("missing.txt").to_string_lossy().to_string();

    let llm = ScriptedLlm::replying(vec![
        assistant_tool_uses(&[
            ("a", "list_files", json!({ "path": path })),
            ("b", "weather", json!({ "city": "Hanoi" })),
            ("c", "read_file", json!({ "path": missing })),
        ]),
        assistant_text("done"),
    ]);
    let store = RecordingStore::new();
    let mut agent = agent_with(llm, &store);

    let mut deltas = Vec::new();
    agent
        .run(&CancellationToken::new(), "go", &mut |d: &str| deltas.push(d.to_string()))
        .await
        .unwrap();

    let results = tool_results(&agent.conversation().messages[2]);
    let ids: Vec<&str> = results.iter().map(|r| r.tool_use_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    assert!(!results[0].is_error);
    assert!(results[1].is_error);
    assert_eq!(results[1].content, "tool not found");
    assert!(results[2].is_error);

    let joined = deltas.concat();
    assert!(joined.contains("✗ weather\n"));
    assert!(joined.contains(&format!("✗ Read {}\n", missing)));
}

#[tokio::test]
async fn test_inference_error_keeps_history() {
    let llm = ScriptedLlm::new(vec![Err(LlmError::inference("scripted", "overloaded"))]);
    let store = RecordingStore::new();
    let mut agent = agent_with(llm, &store);

    let err = agent
        .run(&CancellationToken::new(), "hello", &mut |_: &str| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Inference(_)));
    assert!(err.to_string().contains("overloaded"));
    assert_eq!(agent.conversation().len(), 1);
    assert_eq!(agent.conversation().messages[0].text(), "hello");
    assert_eq!(agent.state(), TurnState::AwaitingUserInput);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_rejected_response_fails_turn() {
    // the user message is accepted, the model's reply is not
    let llm = ScriptedLlm::replying(vec![assistant_text("hi")]).rejecting_messages_after(1);
    let store = RecordingStore::new();
    let mut agent = agent_with(llm, &store);

    let err = agent
        .run(&CancellationToken::new(), "hello", &mut |_: &str| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Translation(_)));
    assert_eq!(agent.conversation().len(), 1);
    assert_eq!(agent.conversation().messages[0].text(), "hello");
    assert_eq!(agent.state(), TurnState::AwaitingUserInput);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_save_failure_fails_turn() {
    let llm = ScriptedLlm::replying(vec![assistant_text("hi")]);
    let store = RecordingStore::new();
    store.fail_on("save_conversation");
    let mut agent = agent_with(llm, &store);

    let err = agent
        .run(&CancellationToken::new(), "hello", &mut |_: &str| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Store(ref e) if !e.is_not_found()));
    assert!(err.to_string().contains("save_conversation refused"));
    assert_eq!(agent.conversation().len(), 2);
    assert_eq!(agent.state(), TurnState::AwaitingUserInput);
    assert_eq!(agent.token_count(), 0);
    assert_eq!(store.writes(), vec!["save_conversation"]);
}

#[tokio::test]
async fn test_token_count_failure_fails_turn() {
    let llm = ScriptedLlm::replying(vec![assistant_text("hi")]).failing_token_count();
    let store = RecordingStore::new();
    let mut agent = agent_with(llm, &store);

    let err = agent
        .run(&CancellationToken::new(), "hello", &mut |_: &str| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Inference(_)));
    assert!(err.to_string().contains("count endpoint unavailable"));
    assert_eq!(agent.conversation().len(), 2);
    assert_eq!(agent.state(), TurnState::AwaitingUserInput);
    assert_eq!(agent.token_count(), 0);

    // the conversation was saved before counting, the count never was
    assert_eq!(store.writes(), vec!["save_conversation"]);
    let stored = store.inner.get_conversation(&agent.conversation().id).await.unwrap();
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn test_cancelled_token_aborts_turn() {
    let store = RecordingStore::new();
    let mut agent = agent_with(ScriptedLlm::replying(vec![assistant_text("hi")]), &store);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = agent.run(&cancel, "hello", &mut |_: &str| {}).await.unwrap_err();

    assert!(matches!(err, AgentError::Cancelled));
    assert!(agent.conversation().is_empty());
}

#[tokio::test]
async fn test_long_history_is_compacted() {
    let mut conversation = Conversation::new();
    for i in 0..25 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        conversation.append(Message::new(role, vec![ContentBlock::text(format!("m{}", i))]));
    }

    let llm = ScriptedLlm::replying(vec![assistant_text("ok")]);
    let record = llm.record.clone();
    let store = RecordingStore::new();
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_conversation(conversation);
    let mut agent = Agent::new(config);

    agent
        .run(&CancellationToken::new(), "next", &mut |_: &str| {})
        .await
        .unwrap();

    let record = record.lock().unwrap();
    assert_eq!(record.history_calls.len(), 1);
    let compacted = &record.history_calls[0];
    assert_eq!(compacted.len(), 21);
    assert_eq!(compacted[0].text(), "m0");
    assert_eq!(compacted[1].text(), "m5");
    assert_eq!(compacted[20].text(), "m24");

    // The stored conversation is never compacted
    let messages = &agent.conversation().messages;
    assert_eq!(messages.len(), 27);
    assert_eq!(messages[25].sequence(), 25);
    assert_eq!(messages[26].sequence(), 26);
}

#[tokio::test]
async fn test_streaming_flag_forwarded() {
    let llm = ScriptedLlm::replying(vec![assistant_text("quiet")]);
    let record = llm.record.clone();
    let store = RecordingStore::new();
    let config =
        AgentConfig::new(Box::new(llm), Arc::new(store.clone())).with_streaming(false);
    let mut agent = Agent::new(config);

    let mut deltas = Vec::new();
    agent
        .run(&CancellationToken::new(), "hi", &mut |d: &str| deltas.push(d.to_string()))
        .await
        .unwrap();

    assert!(deltas.is_empty());
    assert_eq!(record.lock().unwrap().streaming, vec![false]);
}

#[tokio::test]
async fn test_mcp_tools_routed_to_server() {
    let server = MockMcpServer::new("remote")
        .reply("search", McpReply::Value(json!("3 hits")))
        .reply("broken", McpReply::Fail("boom".into()))
        .reply("silent", McpReply::Value(json!(null)));
    let calls = server.calls.clone();

    let mut mcp = McpProxy::new();
    mcp.register_server(
        Arc::new(server),
        vec![
            common::simple_spec("search"),
            common::simple_spec("broken"),
            common::simple_spec("silent"),
        ],
    )
    .unwrap();

    let llm = ScriptedLlm::replying(vec![
        assistant_tool_uses(&[
            ("1", "search", json!({ "q": "rust" })),
            ("2", "broken", json!({})),
            ("3", "silent", json!("not an object")),
        ]),
        assistant_text("done"),
    ]);
    let record = llm.record.clone();
    let store = RecordingStore::new();
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_registry(builtin_registry().unwrap())
        .with_mcp(mcp);
    let mut agent = Agent::new(config);

    let mut deltas = Vec::new();
    agent
        .run(&CancellationToken::new(), "search", &mut |d: &str| deltas.push(d.to_string()))
        .await
        .unwrap();

    let results = tool_results(&agent.conversation().messages[2]);
    assert_eq!(results[0].content, "3 hits");
    assert!(!results[0].is_error);
    assert!(results[1].is_error);
    assert!(results[1]
        .content
        .starts_with("MCP tool broken execution error: "));
    assert!(results[1].content.contains("boom"));
    assert_eq!(
        results[2].content,
        "Tool executed successfully but returned no content"
    );
    assert!(!results[2].is_error);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].1.get("q"), Some(&json!("rust")));
    assert!(calls[2].1.is_empty());

    // Registry tools first, then MCP tools
    let names: Vec<String> = record
        .lock()
        .unwrap()
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names.len(), 8);
    assert_eq!(&names[5..], &["search", "broken", "silent"]);
    assert!(deltas.concat().contains("✗ broken\n"));
}

#[tokio::test]
async fn test_mcp_tool_cannot_shadow_local_tool() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("local.txt"), "x").unwrap();
    let path = dir.path().to_string_lossy().to_string();

    let server = MockMcpServer::new("remote")
        .reply("list_files", McpReply::Value(json!("remote listing")))
        .reply("forecast", McpReply::Value(json!("sunny")));
    let calls = server.calls.clone();
    let mut mcp = McpProxy::new();
    mcp.register_server(
        Arc::new(server),
        vec![common::simple_spec("list_files"), common::simple_spec("forecast")],
    )
    .unwrap();

    let llm = ScriptedLlm::replying(vec![
        assistant_tool_uses(&[
            ("1", "list_files", json!({ "path": path })),
            ("2", "forecast", json!({})),
        ]),
        assistant_text("done"),
    ]);
    let record = llm.record.clone();
    let store = RecordingStore::new();
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_registry(builtin_registry().unwrap())
        .with_mcp(mcp);
    let mut agent = Agent::new(config);

    agent
        .run(&CancellationToken::new(), "go", &mut |_: &str| {})
        .await
        .unwrap();

    let names: Vec<String> = record
        .lock()
        .unwrap()
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names.iter().filter(|n| *n == "list_files").count(), 1);
    assert_eq!(names.len(), 6);
    assert_eq!(names[5], "forecast");

    let results = tool_results(&agent.conversation().messages[2]);
    assert_eq!(results[0].content, "local.txt");
    assert!(!results[0].is_error);
    assert_eq!(results[1].content, "sunny");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "forecast");
}

#[tokio::test(start_paused = true)]
async fn test_mcp_call_bounded_by_delegation_timeout() {
    let server = MockMcpServer::new("remote").reply("slow", McpReply::Hang);
    let mut mcp = McpProxy::new();
    mcp.register_server(Arc::new(server), vec![common::simple_spec("slow")])
        .unwrap();

    let llm = ScriptedLlm::replying(vec![
        assistant_tool_uses(&[("1", "slow", json!({}))]),
        assistant_text("gave up"),
    ]);
    let store = RecordingStore::new();
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()))
        .with_mcp(mcp)
        .with_delegation_timeout(Duration::from_millis(50));
    let mut agent = Agent::new(config);

    agent
        .run(&CancellationToken::new(), "try", &mut |_: &str| {})
        .await
        .unwrap();

    let results = tool_results(&agent.conversation().messages[2]);
    assert!(results[0].is_error);
    assert!(results[0].content.contains("timed out"));
}

#[tokio::test]
async fn test_resume_stored_conversation() {
    let store = RecordingStore::new();
    let mut conversation = store.inner.create_conversation().await.unwrap();
    conversation.append(Message::user_text("earlier"));
    conversation.append(Message::new(Role::Assistant, vec![ContentBlock::text("reply")]));
    store.inner.save_conversation(&conversation).await.unwrap();

    let llm = ScriptedLlm::replying(vec![assistant_text("welcome back")]).with_tokens(7);
    let record = llm.record.clone();
    let config = AgentConfig::new(Box::new(llm), Arc::new(store.clone()));
    let mut agent = Agent::resume(config, &conversation.id).await.unwrap();
    assert_eq!(agent.conversation().len(), 2);
    assert!(agent.plan().is_none());

    agent
        .run(&CancellationToken::new(), "again", &mut |_: &str| {})
        .await
        .unwrap();

    assert_eq!(record.lock().unwrap().history_calls[0].len(), 2);
    assert_eq!(agent.conversation().len(), 4);
    assert_eq!(agent.conversation().messages[2].sequence(), 2);
    assert_eq!(agent.token_count(), 7);
}

#[tokio::test]
async fn test_resume_unknown_conversation_fails() {
    let store = RecordingStore::new();
    let config = AgentConfig::new(
        Box::new(ScriptedLlm::replying(vec![])),
        Arc::new(store.clone()),
    );

    let err = Agent::resume(config, "nope").await.unwrap_err();
    assert!(matches!(err, AgentError::Store(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_create_uses_store_conversation() {
    let store = RecordingStore::new();
    let config = AgentConfig::new(
        Box::new(ScriptedLlm::replying(vec![assistant_text("hi")])),
        Arc::new(store.clone()),
    );
    let agent = Agent::create(config).await.unwrap();

    assert_eq!(store.events(), vec!["create_conversation"]);
    assert!(store.inner.get_conversation(&agent.conversation().id).await.is_ok());
}
