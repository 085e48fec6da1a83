use agaudit_types::{ContentBlock, Message, MessageContent, Role, render_value};
use serde_json::{Map, Value};

/// One tool invocation found in an assistant message
#[derive(Debug, Clone)]
pub struct ToolCallSite {
    pub message_index: usize,
    pub tool_id: String,
    pub params: Map<String, Value>,
}

impl ToolCallSite {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message_index": self.message_index,
            "tool_id": self.tool_id,
            "params": self.params,
        })
    }
}

/// One tool result correlated back to a named tool's invocation
#[derive(Debug, Clone)]
pub struct ToolResultSite {
    pub message_index: usize,
    pub tool_use_id: String,
    pub content: Value,
    pub is_error: bool,
}

impl ToolResultSite {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message_index": self.message_index,
            "tool_use_id": self.tool_use_id,
            "content": self.content,
            "is_error": self.is_error,
        })
    }
}

/// Scan assistant messages for `tool_use` blocks with the given name
pub fn find_tool_calls(messages: &[Message], tool_name: &str) -> Vec<ToolCallSite> {
    let mut calls = Vec::new();
    for (idx, message) in messages.iter().enumerate() {
        if message.role != Role::Assistant {
            continue;
        }
        for block in message.content.blocks() {
            if let ContentBlock::ToolUse { id, name, input } = block
                && name == tool_name
            {
                calls.push(ToolCallSite {
                    message_index: idx,
                    tool_id: id.clone(),
                    params: input.clone(),
                });
            }
        }
    }
    calls
}

/// Find all results for the named tool.
///
/// First collects the `tool_use` ids the tool produced, then scans forward:
/// block-list user messages contribute matching `tool_result` blocks; a
/// tool-role message contributes either a top-level result (plain text
/// content correlated by `tool_call_id`) or its embedded `tool_result`
/// blocks. Payloads that parse as JSON are returned parsed, anything else is
/// wrapped as `{"raw": <text>}`.
pub fn find_tool_results(messages: &[Message], tool_name: &str) -> Vec<ToolResultSite> {
    let mut tool_call_ids: Vec<String> = Vec::new();
    for message in messages {
        if message.role != Role::Assistant {
            continue;
        }
        for block in message.content.blocks() {
            if let ContentBlock::ToolUse { id, name, .. } = block
                && name == tool_name
            {
                tool_call_ids.push(id.clone());
            }
        }
    }

    let mut results = Vec::new();
    for (idx, message) in messages.iter().enumerate() {
        match message.role {
            Role::User => {
                collect_result_blocks(idx, message.content.blocks(), &tool_call_ids, &mut results);
            }
            Role::Tool => match &message.content {
                MessageContent::Text(text) => {
                    if let Some(tool_call_id) = &message.tool_call_id
                        && tool_call_ids.contains(tool_call_id)
                    {
                        results.push(ToolResultSite {
                            message_index: idx,
                            tool_use_id: tool_call_id.clone(),
                            content: parse_payload(&Value::String(text.clone())),
                            is_error: false,
                        });
                    }
                }
                MessageContent::Blocks(blocks) => {
                    collect_result_blocks(idx, blocks, &tool_call_ids, &mut results);
                }
            },
            Role::Assistant => {}
        }
    }

    results
}

fn collect_result_blocks(
    message_index: usize,
    blocks: &[ContentBlock],
    tool_call_ids: &[String],
    results: &mut Vec<ToolResultSite>,
) {
    for block in blocks {
        if let ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } = block
            && tool_call_ids.contains(tool_use_id)
        {
            results.push(ToolResultSite {
                message_index,
                tool_use_id: tool_use_id.clone(),
                content: parse_payload(content),
                is_error: *is_error,
            });
        }
    }
}

fn parse_payload(content: &Value) -> Value {
    match content {
        Value::String(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": text })),
        other => other.clone(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compare two values under an operator name. Both sides are promoted to
/// f64 when they coerce; otherwise `eq`/`ne` fall back to string
/// (in)equality, `contains` to substring over the rendered values, and the
/// ordering operators to false.
pub fn compare(actual: &Value, operator: &str, expected: &Value) -> bool {
    let numeric = as_number(actual).zip(as_number(expected));

    match operator {
        "gt" => numeric.map(|(a, e)| a > e).unwrap_or(false),
        "gte" => numeric.map(|(a, e)| a >= e).unwrap_or(false),
        "lt" => numeric.map(|(a, e)| a < e).unwrap_or(false),
        "lte" => numeric.map(|(a, e)| a <= e).unwrap_or(false),
        "eq" => value_eq(actual, expected),
        "ne" => !value_eq(actual, expected),
        "contains" => render_value(actual).contains(&render_value(expected)),
        _ => false,
    }
}

/// Equality with numeric promotion (so 5000 == 5000.0) and a string
/// fallback for mismatched shapes
pub fn value_eq(actual: &Value, expected: &Value) -> bool {
    if let Some((a, e)) = as_number(actual).zip(as_number(expected)) {
        return a == e;
    }
    if actual == expected {
        return true;
    }
    render_value(actual) == render_value(expected)
}

/// Check a parameter map against a condition map. An empty condition map
/// matches any call; conditions are direct equality or operator objects.
pub fn params_match(actual: &Map<String, Value>, conditions: &Map<String, Value>) -> bool {
    for (param_name, condition) in conditions {
        let Some(actual_value) = actual.get(param_name) else {
            return false;
        };

        match condition {
            Value::Object(operators) => {
                for (operator, expected) in operators {
                    if !compare(actual_value, operator, expected) {
                        return false;
                    }
                }
            }
            expected => {
                if !value_eq(actual_value, expected) {
                    return false;
                }
            }
        }
    }
    true
}

/// Token estimate used by length checks: codepoints / 4. A coarse proxy,
/// kept for parity with historical evaluations.
pub fn estimate_tokens(message: &Message) -> usize {
    message.text().chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    fn invoice_session() -> Vec<Message> {
        vec![
            message(json!({"role": "user", "content": "Create an invoice"})),
            message(json!({
                "role": "assistant",
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "create_invoice",
                     "input": {"total": 5000, "customer": "acme"}}
                ]
            })),
            message(json!({
                "role": "user",
                "content": [
                    {"type": "tool_result", "tool_use_id": "t1",
                     "content": "{\"invoice_id\": \"inv-1\", \"status\": \"created\"}"}
                ]
            })),
        ]
    }

    #[test]
    fn finds_calls_by_name() {
        let calls = find_tool_calls(&invoice_session(), "create_invoice");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message_index, 1);
        assert_eq!(calls[0].tool_id, "t1");

        assert!(find_tool_calls(&invoice_session(), "delete_customer").is_empty());
    }

    #[test]
    fn finds_results_and_parses_json_payload() {
        let results = find_tool_results(&invoice_session(), "create_invoice");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content["invoice_id"], "inv-1");
        assert!(!results[0].is_error);
    }

    #[test]
    fn non_json_payload_is_wrapped_raw() {
        let mut messages = invoice_session();
        messages[2] = message(json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": "plain text output"}
            ]
        }));
        let results = find_tool_results(&messages, "create_invoice");
        assert_eq!(results[0].content["raw"], "plain text output");
    }

    #[test]
    fn tool_role_message_with_plain_text() {
        let mut messages = invoice_session();
        messages[2] = message(json!({
            "role": "tool",
            "tool_call_id": "t1",
            "content": "{\"ok\": true}"
        }));
        let results = find_tool_results(&messages, "create_invoice");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content["ok"], true);
    }

    #[test]
    fn results_for_other_tools_are_ignored() {
        let mut messages = invoice_session();
        messages.push(message(json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "unrelated", "content": "{}"}
            ]
        })));
        assert_eq!(find_tool_results(&messages, "create_invoice").len(), 1);
    }

    #[test]
    fn numeric_promotion_in_compare() {
        assert!(compare(&json!(5000), "gt", &json!(1000)));
        assert!(compare(&json!("5000"), "gt", &json!(1000)));
        assert!(compare(&json!(5000), "eq", &json!(5000.0)));
        assert!(!compare(&json!("abc"), "gt", &json!(1000)));
        assert!(compare(&json!("abc"), "ne", &json!("def")));
        assert!(compare(&json!("hello world"), "contains", &json!("world")));
    }

    #[test]
    fn params_match_operators_and_equality() {
        let actual = json!({"total": 5000, "customer": "acme"});
        let actual = actual.as_object().unwrap();

        let gt = json!({"total": {"gt": 1000}});
        assert!(params_match(actual, gt.as_object().unwrap()));

        let eq = json!({"customer": "acme"});
        assert!(params_match(actual, eq.as_object().unwrap()));

        let missing = json!({"region": "eu"});
        assert!(!params_match(actual, missing.as_object().unwrap()));

        let empty = json!({});
        assert!(params_match(actual, empty.as_object().unwrap()));
    }

    #[test]
    fn token_estimate_is_quarter_of_chars() {
        let msg = message(json!({"role": "assistant", "content": "abcdefgh"}));
        assert_eq!(estimate_tokens(&msg), 2);
    }
}
