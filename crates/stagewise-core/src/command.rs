//! # Commands
//!
//! Declarative lifecycle commands: a target path and an operation name, both
//! resolved by external lookups (topology and registry) at execution time.

use serde::{Deserialize, Serialize};

/// A request to run a named operation on the subtree at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Hierarchical path of the root component.
    pub target: String,
    /// Registry name of the operation.
    pub operation: String,
}

impl Command {
    /// Create a command.
    #[must_use]
    pub fn new(target: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation: operation.into(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.operation, self.target)
    }
}
