//! # Capability Contract
//!
//! Components that want to take part in lifecycle operations implement
//! [`Lifecycle`]. For every stage of an operation the controller calls
//! [`Lifecycle::initiate_state_change`] once, handing over a one-shot
//! [`DoneCallback`].
//!
//! ## Completion Protocol
//!
//! - Return [`StageResult::Done`] when the work for the stage is finished.
//!   The callback is dropped and the controller does not wait.
//! - Return [`StageResult::Pending`] to finish later. The component keeps the
//!   callback and hands it back to
//!   [`LifecycleController::callback_invoked`](crate::LifecycleController::callback_invoked)
//!   exactly once, after returning.
//!
//! A component that reports `Pending` and never hands the callback back stalls
//! its process forever. There is no timeout.

use crate::operation::Operation;
use crate::{CallbackId, ComponentId, ProcessId};

/// Outcome of one stage on one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageResult {
    /// The stage is complete on this component.
    Done,
    /// The component will hand its callback back to the controller later.
    Pending,
}

impl StageResult {
    /// Whether the stage completed synchronously.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, StageResult::Done)
    }
}

impl From<bool> for StageResult {
    fn from(done: bool) -> Self {
        if done {
            StageResult::Done
        } else {
            StageResult::Pending
        }
    }
}

/// One-shot completion token for a pending stage.
///
/// The token carries no reference to controller state, only the ids it is
/// resolved through. It cannot be cloned, so a well-typed participant can hand
/// it back at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending stage stalls until its callback is handed back to the controller"]
pub struct DoneCallback {
    id: CallbackId,
    process: ProcessId,
    component: ComponentId,
}

impl DoneCallback {
    pub(crate) fn new(id: CallbackId, process: ProcessId, component: ComponentId) -> Self {
        Self {
            id,
            process,
            component,
        }
    }

    /// Callback id.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Process this callback belongs to.
    #[must_use]
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Component this callback was issued to.
    #[must_use]
    pub fn component(&self) -> ComponentId {
        self.component
    }
}

/// Interface for components that take part in staged lifecycle operations.
pub trait Lifecycle {
    /// Perform this component's share of `stage` of `operation`.
    ///
    /// Side effects (state transitions, notifications) are the component's
    /// own concern; only the completion signal is standardized.
    fn initiate_state_change(
        &mut self,
        operation: &Operation,
        stage: usize,
        done: DoneCallback,
    ) -> StageResult;

    /// Human-readable status, for components that expose one.
    fn status_name(&self) -> Option<&'static str> {
        None
    }
}

impl<T: Lifecycle + ?Sized> Lifecycle for Box<T> {
    fn initiate_state_change(
        &mut self,
        operation: &Operation,
        stage: usize,
        done: DoneCallback,
    ) -> StageResult {
        (**self).initiate_state_change(operation, stage, done)
    }

    fn status_name(&self) -> Option<&'static str> {
        (**self).status_name()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

    struct Deferring {
        held: Option<DoneCallback>,
    }

    impl Lifecycle for Deferring {
        fn initiate_state_change(
            &mut self,
            _operation: &Operation,
            _stage: usize,
            done: DoneCallback,
        ) -> StageResult {
            self.held = Some(done);
            StageResult::Pending
        }
    }

    #[test]
    fn stage_result_from_bool() {
        assert_eq!(StageResult::from(true), StageResult::Done);
        assert_eq!(StageResult::from(false), StageResult::Pending);
        assert!(StageResult::Done.is_done());
        assert!(!StageResult::Pending.is_done());
    }

    #[test]
    fn pending_component_keeps_its_callback() {
        let mut component = Deferring { held: None };
        let op = Operation::new(OperationKind::UnplugLink);
        let callback = DoneCallback::new(CallbackId(4), ProcessId(2), ComponentId(9));

        let result = component.initiate_state_change(&op, 0, callback);

        assert_eq!(result, StageResult::Pending);
        let held = component.held.take().expect("held callback");
        assert_eq!(held.id(), CallbackId(4));
        assert_eq!(held.process(), ProcessId(2));
        assert_eq!(held.component(), ComponentId(9));
    }

    #[test]
    fn boxed_components_forward() {
        let mut boxed: Box<dyn Lifecycle> = Box::new(Deferring { held: None });
        let op = Operation::new(OperationKind::PlugInLink);
        let callback = DoneCallback::new(CallbackId(0), ProcessId(0), ComponentId(0));

        assert_eq!(
            boxed.initiate_state_change(&op, 0, callback),
            StageResult::Pending
        );
        assert_eq!(boxed.status_name(), None);
    }
}
