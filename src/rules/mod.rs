pub mod engine;
pub mod schema;

pub use engine::RuleEngine;
pub use schema::{ActionKind, ActionSpec, RuleFile};
