//! Scripted validator double: replies come from a queue, every call can run
//! an assertion hook (used to check store discipline during LLM calls).

use agaudit_validator::{Completion, LlmValidator, ValidatorError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type CallHook = Box<dyn Fn() + Send + Sync>;

pub struct ScriptedValidator {
    provider: String,
    replies: Mutex<VecDeque<String>>,
    default_reply: String,
    fail_transport: bool,
    calls: AtomicUsize,
    on_call: Option<CallHook>,
}

impl ScriptedValidator {
    pub fn approving() -> Self {
        Self::with_default_reply(r#"{"compliant": true, "reason": "meets the criteria"}"#)
    }

    pub fn rejecting() -> Self {
        Self::with_default_reply(r#"{"compliant": false, "reason": "does not meet the criteria"}"#)
    }

    pub fn with_default_reply(reply: &str) -> Self {
        ScriptedValidator {
            provider: "anthropic".to_string(),
            replies: Mutex::new(VecDeque::new()),
            default_reply: reply.to_string(),
            fail_transport: false,
            calls: AtomicUsize::new(0),
            on_call: None,
        }
    }

    /// Fails every call with a transport error
    pub fn failing() -> Self {
        let mut validator = Self::with_default_reply("");
        validator.fail_transport = true;
        validator
    }

    pub fn provider_name(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    /// Queue replies consumed in order before falling back to the default
    pub fn queue_reply(self, reply: &str) -> Self {
        self.replies
            .lock()
            .expect("reply queue lock")
            .push_back(reply.to_string());
        self
    }

    /// Run an assertion on every validator call
    pub fn on_call(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmValidator for ScriptedValidator {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, _prompt: &str, _model: &str) -> Result<Completion, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_call {
            hook();
        }

        if self.fail_transport {
            return Err(ValidatorError::Transport(
                "scripted transport failure".to_string(),
            ));
        }

        let text = self
            .replies
            .lock()
            .expect("reply queue lock")
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        Ok(Completion {
            text,
            input_tokens: 120,
            output_tokens: 25,
        })
    }
}
