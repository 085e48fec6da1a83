//! Message, session and policy builders used across the test suites.

use agaudit_types::{Message, PolicyConfig, Session, SessionMetadata};
use serde_json::{Value, json};

fn message(value: Value) -> Message {
    serde_json::from_value(value).expect("fixture message is well formed")
}

pub fn user_text(text: &str) -> Message {
    message(json!({"role": "user", "content": text}))
}

pub fn assistant_text(text: &str) -> Message {
    message(json!({"role": "assistant", "content": text}))
}

/// Assistant message with a single tool_use block; the block id is
/// `t-<tool name>` so results can correlate back to it.
pub fn assistant_tool_call(tool_name: &str, input: Value) -> Message {
    message(json!({
        "role": "assistant",
        "content": [
            {"type": "tool_use", "id": format!("t-{}", tool_name), "name": tool_name, "input": input}
        ]
    }))
}

pub fn tool_result_message(tool_use_id: &str, content: &str, is_error: bool) -> Message {
    message(json!({
        "role": "user",
        "content": [
            {"type": "tool_result", "tool_use_id": tool_use_id, "content": content,
             "is_error": is_error}
        ]
    }))
}

/// An invoice-creation exchange: the assistant creates an invoice for the
/// given total, optionally requests human approval afterwards.
pub fn invoice_messages(total: i64, with_approval: bool) -> Vec<Message> {
    let mut messages = vec![
        user_text("Please create the invoice for this order."),
        assistant_tool_call("create_invoice", json!({"total": total, "customer": "acme"})),
        tool_result_message(
            "t-create_invoice",
            r#"{"invoice_id": "inv-1", "status": "created"}"#,
            false,
        ),
    ];

    if with_approval {
        messages.push(assistant_tool_call(
            "request_human_approval",
            json!({"reason": "high value invoice"}),
        ));
        messages.push(tool_result_message(
            "t-request_human_approval",
            r#"{"approved": true}"#,
            false,
        ));
    }

    messages.push(assistant_text("The invoice has been created."));
    messages
}

pub fn session(agent_id: &str, session_id: &str, messages: Vec<Message>) -> Session {
    Session {
        id: session_id.to_string(),
        agent_id: agent_id.to_string(),
        messages,
        metadata: SessionMetadata::default(),
    }
}

/// Policy config for the canonical approval rule: if a high-value invoice
/// is created, human approval must be requested.
pub fn approval_policy_config() -> PolicyConfig {
    serde_json::from_value(json!({
        "checks": [
            {"id": "trigger_high_value", "name": "High value invoice", "type": "tool_call",
             "tool_name": "create_invoice", "params": {"total": {"gt": 1000}}},
            {"id": "require_approval", "name": "Approval requested", "type": "tool_call",
             "tool_name": "request_human_approval"}
        ],
        "violation_logic": {
            "type": "IF_ANY_THEN_ALL",
            "triggers": ["trigger_high_value"],
            "requirements": ["require_approval"]
        }
    }))
    .expect("fixture policy config is well formed")
}

/// Policy config forbidding a tool outright
pub fn forbid_tool_policy_config(tool_name: &str) -> PolicyConfig {
    serde_json::from_value(json!({
        "checks": [
            {"id": "forbidden_tool", "name": format!("Called {}", tool_name), "type": "tool_call",
             "tool_name": tool_name}
        ],
        "violation_logic": {"type": "FORBID_ALL", "forbidden": ["forbidden_tool"]}
    }))
    .expect("fixture policy config is well formed")
}
