use crate::validate::LlmValidator;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider-keyed registry of validators. Built once at startup and shared
/// read-only with every worker; checks resolve their provider at evaluation
/// time and report an unknown provider as a failing validation rather than
/// an engine error.
#[derive(Default, Clone)]
pub struct ValidatorFactory {
    validators: HashMap<String, Arc<dyn LlmValidator>>,
}

impl ValidatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Arc<dyn LlmValidator>) {
        self.validators
            .insert(validator.provider().to_string(), validator);
    }

    pub fn with(mut self, validator: Arc<dyn LlmValidator>) -> Self {
        self.register(validator);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn LlmValidator>> {
        self.validators.get(provider).cloned()
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        providers.sort();
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Completion, ValidatorError};
    use async_trait::async_trait;

    struct StubValidator(&'static str);

    #[async_trait]
    impl LlmValidator for StubValidator {
        fn provider(&self) -> &str {
            self.0
        }

        async fn complete(
            &self,
            _prompt: &str,
            _model: &str,
        ) -> Result<Completion, ValidatorError> {
            Err(ValidatorError::Provider("stub".to_string()))
        }
    }

    #[test]
    fn lookup_by_provider_name() {
        let factory = ValidatorFactory::new()
            .with(Arc::new(StubValidator("anthropic")))
            .with(Arc::new(StubValidator("openai")));

        assert!(factory.get("anthropic").is_some());
        assert!(factory.get("mistral").is_none());
        assert_eq!(factory.providers(), vec!["anthropic", "openai"]);
    }
}
