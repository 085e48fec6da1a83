mod cost;
mod error;
mod factory;
mod parse;
mod prompt;
mod validate;

pub use cost::calculate_cost;
pub use error::ValidatorError;
pub use factory::ValidatorFactory;
pub use parse::{Verdict, parse_verdict};
pub use prompt::{PromptTarget, build_prompt};
pub use validate::{Completion, LlmValidator, Validation, validate};
