use once_cell::sync::Lazy;
use std::collections::HashMap;

/// USD per million tokens
#[derive(Debug, Clone, Copy)]
struct ModelPricing {
    input: f64,
    output: f64,
}

/// Unknown models fall back to this entry; cost accounting must never fail
/// an evaluation.
const REFERENCE_MODEL: &str = "claude-sonnet-4-5-20250929";

static PRICING: Lazy<HashMap<&'static str, ModelPricing>> = Lazy::new(|| {
    HashMap::from([
        // Anthropic models
        (
            "claude-sonnet-4-5-20250929",
            ModelPricing {
                input: 3.00,
                output: 15.00,
            },
        ),
        (
            "claude-opus-4-20250514",
            ModelPricing {
                input: 15.00,
                output: 75.00,
            },
        ),
        (
            "claude-haiku-3-5-20241022",
            ModelPricing {
                input: 0.80,
                output: 4.00,
            },
        ),
        // OpenAI models
        (
            "gpt-4o",
            ModelPricing {
                input: 2.50,
                output: 10.00,
            },
        ),
        (
            "gpt-4o-mini",
            ModelPricing {
                input: 0.15,
                output: 0.60,
            },
        ),
    ])
});

/// Cost in USD for one call, rounded to micro-dollars
pub fn calculate_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let pricing = PRICING
        .get(model)
        .or_else(|| PRICING.get(REFERENCE_MODEL))
        .copied()
        .expect("reference model is always in the table");

    let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input;
    let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output;
    round_micros(input_cost + output_cost)
}

fn round_micros(cost: f64) -> f64 {
    (cost * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sonnet_class_pricing() {
        // 1M input + 1M output at {3.00, 15.00}
        assert_eq!(
            calculate_cost("claude-sonnet-4-5-20250929", 1_000_000, 1_000_000),
            18.0
        );
    }

    #[test]
    fn mini_class_pricing() {
        assert_eq!(calculate_cost("gpt-4o-mini", 1_000_000, 0), 0.15);
    }

    #[test]
    fn unknown_model_uses_reference_price() {
        let unknown = calculate_cost("some-future-model", 2_000, 500);
        let reference = calculate_cost("claude-sonnet-4-5-20250929", 2_000, 500);
        assert_eq!(unknown, reference);
    }

    #[test]
    fn cost_is_rounded_to_micro_dollars() {
        let cost = calculate_cost("claude-haiku-3-5-20241022", 123, 45);
        assert_eq!(cost, (cost * 1e6).round() / 1e6);
    }
}
