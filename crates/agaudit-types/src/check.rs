use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of evaluating a single check against a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub check_name: String,
    pub check_type: String,
    pub passed: bool,
    pub message: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub matched_items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_usage: Option<Value>,
}

impl CheckResult {
    /// Placeholder for a requirement id that resolved to no evaluated check
    pub fn not_found(check_id: &str) -> Self {
        CheckResult {
            check_id: check_id.to_string(),
            check_name: format!("Unknown check {}", check_id),
            check_type: "unknown".to_string(),
            passed: false,
            message: format!("Check '{}' not found", check_id),
            details: Value::Null,
            matched_items: Vec::new(),
            llm_usage: None,
        }
    }

    /// Serialized form embedded in evaluation detail records
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "check_id": self.check_id,
            "check_name": self.check_name,
            "check_type": self.check_type,
            "passed": self.passed,
            "message": self.message,
            "details": self.details,
            "matched_items": self.matched_items,
            "llm_usage": self.llm_usage,
        })
    }

    /// Message indices referenced by matched items, if any
    pub fn message_indices(&self) -> Vec<u64> {
        self.matched_items
            .iter()
            .filter_map(|item| item.get("message_index").and_then(Value::as_u64))
            .collect()
    }
}
