// Per-scope rule storage.

mod scoped;

pub use scoped::{RuleSetState, ScopedRuleStore};
