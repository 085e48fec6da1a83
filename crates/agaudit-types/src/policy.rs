use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Policy severity surfaced in summaries and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// How check outcomes combine into a policy verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicKind {
    RequireAny,
    IfAnyThenAll,
    IfAllThenAll,
    ForbidAll,
    /// Every listed requirement must pass. Unknown kinds fall back here.
    #[default]
    #[serde(other)]
    RequireAll,
}

impl LogicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicKind::RequireAll => "REQUIRE_ALL",
            LogicKind::RequireAny => "REQUIRE_ANY",
            LogicKind::IfAnyThenAll => "IF_ANY_THEN_ALL",
            LogicKind::IfAllThenAll => "IF_ALL_THEN_ALL",
            LogicKind::ForbidAll => "FORBID_ALL",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationLogic {
    #[serde(rename = "type", default)]
    pub kind: LogicKind,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
}

/// One predicate specification inside a policy config. Type-specific
/// parameters stay as a raw map; the engine's registry parses them when the
/// check is built, so unknown types survive loading and are skipped at
/// evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub check_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_message: Option<String>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl CheckSpec {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Check {}", self.id))
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
    #[serde(default)]
    pub violation_logic: ViolationLogic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    pub enabled: bool,
    pub config: PolicyConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logic_kind_roundtrip() {
        let logic: ViolationLogic = serde_json::from_value(serde_json::json!({
            "type": "IF_ANY_THEN_ALL",
            "triggers": ["t1"],
            "requirements": ["r1", "r2"]
        }))
        .unwrap();
        assert_eq!(logic.kind, LogicKind::IfAnyThenAll);
        assert_eq!(logic.requirements.len(), 2);
        assert!(logic.forbidden.is_empty());
    }

    #[test]
    fn unknown_logic_kind_defaults_to_require_all() {
        let logic: ViolationLogic =
            serde_json::from_value(serde_json::json!({"type": "SOMETHING_NEW"})).unwrap();
        assert_eq!(logic.kind, LogicKind::RequireAll);
    }

    #[test]
    fn check_spec_keeps_type_specific_params() {
        let spec: CheckSpec = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "High value invoice",
            "type": "tool_call",
            "tool_name": "create_invoice",
            "params": {"total": {"gt": 1000}}
        }))
        .unwrap();
        assert_eq!(spec.check_type, "tool_call");
        assert_eq!(
            spec.param("tool_name"),
            Some(&Value::String("create_invoice".to_string()))
        );
    }

    #[test]
    fn check_spec_name_fallback() {
        let spec: CheckSpec =
            serde_json::from_value(serde_json::json!({"id": "c9", "type": "tool_absence"}))
                .unwrap();
        assert_eq!(spec.display_name(), "Check c9");
    }
}
