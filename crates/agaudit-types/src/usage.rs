use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token and cost accounting for one validator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// Rolled-up usage across evaluations. Accepts both the per-call key
/// spelling (`input_tokens`) and the per-check aggregate spelling
/// (`total_input_tokens`), so nested aggregates contribute instead of
/// summing to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    pub fn absorb(&mut self, usage: &Map<String, Value>) {
        let get_u64 = |primary: &str, aggregate: &str| -> u64 {
            usage
                .get(primary)
                .or_else(|| usage.get(aggregate))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };

        self.total_calls += usage
            .get("api_calls")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        self.input_tokens += get_u64("input_tokens", "total_input_tokens");
        self.output_tokens += get_u64("output_tokens", "total_output_tokens");
        self.total_tokens += usage
            .get("total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        self.cost_usd += usage
            .get("cost_usd")
            .or_else(|| usage.get("total_cost_usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_per_call_record() {
        let mut totals = UsageTotals::default();
        let usage = serde_json::json!({
            "provider": "anthropic",
            "model": "claude-sonnet-4-5-20250929",
            "input_tokens": 120,
            "output_tokens": 30,
            "total_tokens": 150,
            "cost_usd": 0.00081
        });
        totals.absorb(usage.as_object().unwrap());

        assert_eq!(totals.total_calls, 1);
        assert_eq!(totals.input_tokens, 120);
        assert_eq!(totals.total_tokens, 150);
        assert!((totals.cost_usd - 0.00081).abs() < 1e-9);
    }

    #[test]
    fn absorb_aggregate_record() {
        let mut totals = UsageTotals::default();
        let usage = serde_json::json!({
            "provider": "anthropic",
            "model": "claude-sonnet-4-5-20250929",
            "api_calls": 3,
            "total_input_tokens": 300,
            "total_output_tokens": 90,
            "total_tokens": 390,
            "total_cost_usd": 0.0024
        });
        totals.absorb(usage.as_object().unwrap());

        assert_eq!(totals.total_calls, 3);
        assert_eq!(totals.input_tokens, 300);
        assert_eq!(totals.output_tokens, 90);
        assert_eq!(totals.total_tokens, 390);
    }
}
