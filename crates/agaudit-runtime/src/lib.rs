mod error;
mod evaluate;
mod jobs;
mod status;
mod variants;

pub use error::{Error, Result};
pub use evaluate::evaluate_and_store;
pub use jobs::{JobController, SubmitReceipt, SubmitRequest};
pub use status::{
    AgentSummary, PolicyRef, PolicyRollup, SessionRollup, ViolatedPolicy, agent_summary,
};
pub use variants::{RefreshSummary, refresh_variants};
