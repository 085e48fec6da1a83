use agaudit_types::truthy;
use serde_json::Value;

const APPROVAL_KEYWORDS: &[&str] = &[
    "compliant",
    "approved",
    "yes",
    "pass",
    "valid",
    "correct",
    "acceptable",
];

const REJECTION_KEYWORDS: &[&str] = &[
    "violation",
    "non-compliant",
    "does not comply",
    "fails",
    "rejected",
    "denied",
    "invalid",
    "incorrect",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub reason: String,
}

/// Decode a validator reply into a binary verdict.
///
/// Preferred path: strip markdown code fences, JSON-decode, read the
/// `compliant` field (truthy coercion) and `reason`. Fallback path: scan for
/// approval and rejection keywords; only an approval with no rejection
/// passes, everything else fails (fail safe).
pub fn parse_verdict(reply: &str) -> Verdict {
    if let Some(verdict) = parse_structured(reply) {
        return verdict;
    }

    let lower = reply.to_lowercase();
    let has_approval = APPROVAL_KEYWORDS.iter().any(|word| lower.contains(word));
    let has_rejection = REJECTION_KEYWORDS.iter().any(|word| lower.contains(word));

    // Rejection takes precedence when both are present; no keywords at all
    // also fails.
    let passed = has_approval && !has_rejection;

    Verdict {
        passed,
        reason: reply.to_string(),
    }
}

fn parse_structured(reply: &str) -> Option<Verdict> {
    let cleaned = strip_code_fences(reply);
    let value: Value = serde_json::from_str(&cleaned).ok()?;
    let compliant = value.get("compliant")?;

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| reply.to_string());

    Some(Verdict {
        passed: truthy(compliant),
        reason,
    })
}

fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let inner = if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        trimmed.to_string()
    };
    inner.replace("```json", "").replace("```", "").trim().to_string()
}
