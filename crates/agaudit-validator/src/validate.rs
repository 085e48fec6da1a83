use crate::cost::calculate_cost;
use crate::error::ValidatorError;
use crate::parse::parse_verdict;
use crate::prompt::{PromptTarget, build_prompt};
use agaudit_types::LlmUsage;
use async_trait::async_trait;

/// Raw reply from one LLM completion call
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The transport seam. Implementations wrap one provider's API; everything
/// above the raw completion (prompt envelope, verdict parsing, cost
/// accounting, fail-safe error handling) lives in [`validate`].
#[async_trait]
pub trait LlmValidator: Send + Sync {
    /// Provider id, e.g. "anthropic" or "openai"
    fn provider(&self) -> &str;

    /// Send one prompt and return the raw reply with token counts
    async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, ValidatorError>;
}

/// Outcome of one validation call, in the shape checks embed into their
/// details
#[derive(Debug, Clone)]
pub struct Validation {
    pub passed: bool,
    pub response: String,
    pub error: bool,
    pub usage: Option<LlmUsage>,
}

impl Validation {
    pub fn failed(response: impl Into<String>) -> Self {
        Validation {
            passed: false,
            response: response.into(),
            error: true,
            usage: None,
        }
    }
}

/// Run one binary-verdict validation: build the fixed envelope, call the
/// validator, decode the verdict, attach usage. Transport errors become a
/// failing result with `error: true` and no usage; the caller's evaluation
/// continues.
pub async fn validate(
    validator: &dyn LlmValidator,
    target: PromptTarget,
    payload: &str,
    criteria: &str,
    model: &str,
) -> Validation {
    let prompt = build_prompt(target, criteria, payload);

    let completion = match validator.complete(&prompt, model).await {
        Ok(completion) => completion,
        Err(err) => {
            tracing::warn!(provider = validator.provider(), model, error = %err, "validator call failed");
            return Validation::failed(format!("LLM validation error: {}", err));
        }
    };

    let usage = LlmUsage {
        provider: validator.provider().to_string(),
        model: model.to_string(),
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        total_tokens: completion.input_tokens + completion.output_tokens,
        cost_usd: calculate_cost(model, completion.input_tokens, completion.output_tokens),
    };

    let verdict = parse_verdict(&completion.text);
    Validation {
        passed: verdict.passed,
        response: verdict.reason,
        error: false,
        usage: Some(usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedValidator {
        reply: Result<Completion, fn() -> ValidatorError>,
    }

    #[async_trait]
    impl LlmValidator for CannedValidator {
        fn provider(&self) -> &str {
            "anthropic"
        }

        async fn complete(
            &self,
            _prompt: &str,
            _model: &str,
        ) -> Result<Completion, ValidatorError> {
            match &self.reply {
                Ok(completion) => Ok(completion.clone()),
                Err(make_err) => Err(make_err()),
            }
        }
    }

    #[tokio::test]
    async fn successful_validation_carries_usage() {
        let validator = CannedValidator {
            reply: Ok(Completion {
                text: r#"{"compliant": true, "reason": "grounded"}"#.to_string(),
                input_tokens: 200,
                output_tokens: 20,
            }),
        };

        let validation = validate(
            &validator,
            PromptTarget::Content,
            "the summary",
            "must be grounded",
            "claude-sonnet-4-5-20250929",
        )
        .await;

        assert!(validation.passed);
        assert!(!validation.error);
        let usage = validation.usage.unwrap();
        assert_eq!(usage.total_tokens, 220);
        assert!(usage.cost_usd > 0.0);
    }

    #[tokio::test]
    async fn transport_error_fails_safe_without_usage() {
        let validator = CannedValidator {
            reply: Err(|| ValidatorError::Transport("connection reset".to_string())),
        };

        let validation = validate(
            &validator,
            PromptTarget::Value,
            "x",
            "y",
            "claude-sonnet-4-5-20250929",
        )
        .await;

        assert!(!validation.passed);
        assert!(validation.error);
        assert!(validation.usage.is_none());
        assert!(validation.response.contains("LLM validation error"));
        assert!(validation.response.contains("connection reset"));
    }
}
