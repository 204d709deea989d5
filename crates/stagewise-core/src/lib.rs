//! # stagewise-core
//!
//! The staged lifecycle engine for Stagewise - THE LOGIC.
//!
//! This crate coordinates shutdown, startup and failure operations across a
//! tree of components. Each component may finish its share of a stage at once
//! or report it pending and complete later through a one-shot callback. The
//! controller guarantees a stage barrier: every component of the targeted
//! subtree finishes stage *k* before any of them begins stage *k+1*.
//!
//! ## Layout
//!
//! - `operation` → operation kinds, stage counts, layer ordering tables
//! - `lifecycle` → the capability contract and its callback token
//! - `controller` → processes and the stage engine
//! - `topology` → tree access trait and the in-memory tree
//! - `registry` → name → operation factories
//! - `status` → reference participants (node/interface/link status, services)
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and cooperative: a pending stage unwinds the stack, a
//!   callback handed back to the controller resumes it
//! - No timeouts, no cancellation, no rollback: a participant that never hands
//!   its callback back stalls its process
//! - Deterministic: pre-order traversal, `BTreeMap` bookkeeping, monotonic ids

// =============================================================================
// MODULES
// =============================================================================

pub mod command;
pub mod controller;
pub mod lifecycle;
pub mod operation;
pub mod registry;
pub mod status;
pub mod topology;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{CallbackId, ComponentId, LifecycleError, ProcessId};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use command::Command;
pub use controller::{LifecycleController, Process, ProcessSnapshot, Progress};
pub use lifecycle::{DoneCallback, Lifecycle, StageResult};
pub use operation::{
    Direction, Layer, NODE_SHUTDOWN_LAYERS, NODE_START_LAYERS, Operation, OperationKind,
};
pub use registry::{OperationFactory, OperationRegistry};
pub use topology::{ComponentTree, Topology};

// =============================================================================
// RE-EXPORTS: Participants
// =============================================================================

pub use status::{
    InterfaceState, InterfaceStatus, LayeredService, LinkState, LinkStatus, NodeState, NodeStatus,
    StageEffect, StatusChange, StatusListener, StatusModel, StatusParticipant,
};
