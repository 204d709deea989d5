//! # Lifecycle Controller
//!
//! Drives staged operations over a subtree of components.
//!
//! For each stage the controller walks the subtree in pre-order (component
//! first, then its children in declared order) and calls every participant.
//! Participants that finish synchronously are forgotten; participants that
//! report a pending stage are remembered in the process's outstanding set.
//!
//! - Empty outstanding set after the walk: the stage advances and the walk
//!   repeats immediately, without returning to the caller.
//! - Non-empty outstanding set: the caller gets [`Progress::Pending`] and the
//!   stack unwinds. The last callback handed back through
//!   [`LifecycleController::callback_invoked`] advances the stage.
//!
//! Stage `k` is a barrier across the whole subtree: nothing in the subtree
//! sees stage `k + 1` before every participant has resolved stage `k`.
//! When the last stage resolves the process is retired.
//!
//! The controller does not detect two processes running on overlapping
//! subtrees; keeping them apart is the caller's obligation.

use crate::command::Command;
use crate::lifecycle::{DoneCallback, StageResult};
use crate::operation::Operation;
use crate::registry::OperationRegistry;
use crate::topology::Topology;
use crate::{CallbackId, ComponentId, LifecycleError, ProcessId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PROGRESS
// =============================================================================

/// Result of initiating or resuming an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    /// Every stage resolved; the process is retired.
    Done,
    /// The process waits for outstanding callbacks.
    Pending(ProcessId),
}

impl Progress {
    /// Whether the operation has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Progress::Done)
    }
}

// =============================================================================
// PROCESS
// =============================================================================

/// Bookkeeping for one in-flight operation on one subtree.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    root: ComponentId,
    operation: Operation,
    stage: usize,
    /// Pending callbacks of the current stage and the component each was
    /// issued to.
    outstanding: BTreeMap<CallbackId, ComponentId>,
}

impl Process {
    fn new(id: ProcessId, root: ComponentId, operation: Operation) -> Self {
        Self {
            id,
            root,
            operation,
            stage: 0,
            outstanding: BTreeMap::new(),
        }
    }

    /// Process id.
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Root of the targeted subtree.
    #[must_use]
    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// The operation being run.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Current stage index.
    #[must_use]
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Components the current stage is waiting on, in callback order.
    pub fn outstanding(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.outstanding.values().copied()
    }

    /// Number of callbacks the current stage is waiting on.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Serializable view of this process.
    #[must_use]
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id,
            root: self.root,
            operation: self.operation.kind().name().to_string(),
            stage: self.stage,
            stage_count: self.operation.stage_count(),
            outstanding: self.outstanding().collect(),
        }
    }
}

/// Point-in-time view of a process, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Process id.
    pub id: ProcessId,
    /// Root of the targeted subtree.
    pub root: ComponentId,
    /// Registry name of the operation kind.
    pub operation: String,
    /// Current stage index.
    pub stage: usize,
    /// Total number of stages.
    pub stage_count: usize,
    /// Components the current stage is waiting on.
    pub outstanding: Vec<ComponentId>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Owns all in-flight processes and drives their stages.
#[derive(Debug, Default)]
pub struct LifecycleController {
    processes: BTreeMap<ProcessId, Process>,
    next_process_id: u64,
    next_callback_id: u64,
    retired: u64,
}

impl LifecycleController {
    /// Create a controller with no active processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `operation` on the subtree rooted at `root`.
    ///
    /// Returns [`Progress::Done`] if every stage resolved synchronously,
    /// otherwise [`Progress::Pending`] with the id of the waiting process.
    pub fn initiate<T: Topology + ?Sized>(
        &mut self,
        topology: &mut T,
        root: ComponentId,
        operation: Operation,
    ) -> Result<Progress, LifecycleError> {
        if !topology.contains(root) {
            return Err(LifecycleError::ComponentNotFound(root));
        }

        let id = ProcessId(self.next_process_id);
        self.next_process_id = self.next_process_id.saturating_add(1);

        tracing::info!(
            process = %id,
            root = %root,
            operation = %operation,
            "initiating lifecycle operation"
        );
        self.processes
            .insert(id, Process::new(id, root, operation));

        Ok(self.resume(topology, id))
    }

    /// Resolve a declarative command and start it.
    ///
    /// The target path is resolved first, then the operation name; both
    /// failures are reported before any process exists.
    pub fn execute<T: Topology + ?Sized>(
        &mut self,
        topology: &mut T,
        registry: &OperationRegistry,
        command: &Command,
    ) -> Result<Progress, LifecycleError> {
        let root = topology
            .resolve(&command.target)
            .ok_or_else(|| LifecycleError::NotFound(command.target.clone()))?;
        let operation = registry.create(&command.operation)?;
        self.initiate(topology, root, operation)
    }

    /// Hand back a callback whose component finished its pending stage.
    ///
    /// If this was the last outstanding callback of the stage, the process
    /// advances, which may resolve further stages or retire it.
    ///
    /// A callback whose process is gone, or that is not in the outstanding
    /// set of its process, is a usage fault.
    pub fn callback_invoked<T: Topology + ?Sized>(
        &mut self,
        topology: &mut T,
        callback: DoneCallback,
    ) -> Result<Progress, LifecycleError> {
        let process_id = callback.process();
        let process = self.processes.get_mut(&process_id).ok_or(
            LifecycleError::ProcessNotActive {
                process: process_id,
                callback: callback.id(),
            },
        )?;

        if process.outstanding.get(&callback.id()) != Some(&callback.component()) {
            return Err(LifecycleError::CallbackNotPending {
                process: process_id,
                callback: callback.id(),
            });
        }
        process.outstanding.remove(&callback.id());

        tracing::debug!(
            process = %process_id,
            component = %callback.component(),
            stage = process.stage,
            remaining = process.outstanding.len(),
            "pending stage completed"
        );

        if !process.outstanding.is_empty() {
            return Ok(Progress::Pending(process_id));
        }

        process.stage += 1;
        Ok(self.resume(topology, process_id))
    }

    /// An active process.
    #[must_use]
    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// Active processes in id order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Whether `id` is still running.
    #[must_use]
    pub fn is_active(&self, id: ProcessId) -> bool {
        self.processes.contains_key(&id)
    }

    /// Number of active processes.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.processes.len()
    }

    /// Number of processes retired so far.
    #[must_use]
    pub fn retired_count(&self) -> u64 {
        self.retired
    }

    /// Run stages until one is left pending or the process retires.
    fn resume<T: Topology + ?Sized>(&mut self, topology: &mut T, id: ProcessId) -> Progress {
        let Some(process) = self.processes.get_mut(&id) else {
            return Progress::Done;
        };

        while process.stage < process.operation.stage_count() {
            visit(&mut self.next_callback_id, process, topology);

            if !process.outstanding.is_empty() {
                tracing::debug!(
                    process = %id,
                    stage = process.stage,
                    pending = process.outstanding.len(),
                    "stage pending"
                );
                return Progress::Pending(id);
            }

            tracing::debug!(process = %id, stage = process.stage, "stage resolved");
            process.stage += 1;
        }

        self.processes.remove(&id);
        self.retired = self.retired.saturating_add(1);
        tracing::info!(process = %id, "lifecycle operation completed");
        Progress::Done
    }
}

/// Run the current stage of `process` on every participant of its subtree.
///
/// Every visit gets a fresh callback id; ids are never reused, so a token
/// kept past a synchronous completion cannot alias a later pending one.
fn visit<T: Topology + ?Sized>(next_callback_id: &mut u64, process: &mut Process, topology: &mut T) {
    let mut stack = vec![process.root];

    while let Some(component) = stack.pop() {
        if let Some(participant) = topology.participant(component) {
            let callback_id = CallbackId(*next_callback_id);
            *next_callback_id = next_callback_id.saturating_add(1);
            let done = DoneCallback::new(callback_id, process.id, component);

            match participant.initiate_state_change(&process.operation, process.stage, done) {
                StageResult::Done => {}
                StageResult::Pending => {
                    process.outstanding.insert(callback_id, component);
                }
            }
            tracing::trace!(
                process = %process.id,
                component = %component,
                stage = process.stage,
                "component visited"
            );
        }

        stack.extend(topology.children(component).iter().rev().copied());
    }
}

// =============================================================================
// TESTS
// =============================================================================
