//! # stagewise
//!
//! Scenario loading and simulation on top of `stagewise-core`.
//!
//! - `catalogue` → the serializable list of registered operations
//! - `scenario` → TOML scenario documents and tree construction
//! - `sim` → the discrete-event agenda, delayed participants and run reports

pub mod catalogue;
pub mod scenario;
pub mod sim;

pub use catalogue::{OperationInfo, operation_catalogue};
pub use scenario::{ComponentKind, ComponentSpec, Scenario, ScenarioSummary, ScheduledCommand};
pub use sim::{
    Agenda, CommandOutcome, CommandReport, ComponentReport, RunReport, Simulation, StalledProcess,
    TimelineEntry,
};
