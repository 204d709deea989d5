//! # Core Type Definitions
//!
//! This module contains the shared types of the Stagewise lifecycle engine:
//! - Identifiers (`ComponentId`, `ProcessId`, `CallbackId`)
//! - Error types (`LifecycleError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers:
//! - Are plain integers handed out by monotonic counters
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a component in the topology.
///
/// The controller never owns components; it only remembers their ids while a
/// stage is pending on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

/// Identifier of an in-flight lifecycle process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

/// Identifier of a completion callback.
///
/// Callback ids may be recycled once a component resolves synchronously, so an
/// id alone does not identify a callback across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallbackId(pub u64);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cb{}", self.0)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Stagewise system.
///
/// - Lookup failures (`NotFound`, `UnknownOperation`) are returned before any
///   process is created
/// - Usage faults are detected when a callback is invoked and indicate a
///   defective participant; they are never retried
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The target path does not resolve to a component.
    #[error("Component '{0}' not found")]
    NotFound(String),

    /// The operation type name is not registered.
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    /// The component id is not part of the topology.
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    /// An operation must have at least one stage.
    #[error("Invalid stage count {0}: an operation needs at least one stage")]
    InvalidStageCount(usize),

    /// An operation name was registered twice.
    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),

    /// A component path was declared twice.
    #[error("Component '{0}' already exists")]
    DuplicateComponent(String),

    /// A component path or name is malformed.
    #[error("Invalid component path '{0}'")]
    InvalidPath(String),

    /// Usage fault: the callback refers to a process that is not active.
    #[error(
        "Usage error: callback {callback} refers to process {process}, which is retired or unknown"
    )]
    ProcessNotActive {
        /// The process named by the callback.
        process: ProcessId,
        /// The offending callback.
        callback: CallbackId,
    },

    /// Usage fault: the callback is not in the outstanding set of its process.
    #[error(
        "Usage error: callback {callback} is not pending for process {process}; it may only be invoked once, after the component reported a pending stage"
    )]
    CallbackNotPending {
        /// The process named by the callback.
        process: ProcessId,
        /// The offending callback.
        callback: CallbackId,
    },

    /// A scenario or configuration document is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl LifecycleError {
    /// Whether this error is a usage fault raised by a misbehaving participant.
    #[must_use]
    pub fn is_usage_fault(&self) -> bool {
        matches!(
            self,
            Self::ProcessNotActive { .. } | Self::CallbackNotPending { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
