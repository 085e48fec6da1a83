//! Test fixtures and doubles shared by the agaudit crates' test suites.

pub mod fixtures;
pub mod validators;
pub mod world;

pub use validators::ScriptedValidator;
pub use world::SessionWorld;
