mod db;
mod records;
mod schema;

pub use db::{Store, StoreHandle};
pub use records::{JobUpdate, TransitionSeed, VariantSeed};
