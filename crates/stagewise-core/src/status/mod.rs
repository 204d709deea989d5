//! # Status Participants
//!
//! Reference participants for the capability contract: small state machines
//! that track whether a node, interface or link is in service.
//!
//! Every domain has four states, two stable and two transitional:
//!
//! | Domain | Up | Down | Going up | Going down |
//! |--------|----|------|----------|------------|
//! | node | on | off | turning on | turning off |
//! | interface | up | down | bringing up | bringing down |
//! | link | plugged in | unplugged | plugging in | unplugging |
//!
//! On stage 0 of the domain's start (stop) operation the participant enters
//! the transitional state; on the final stage it settles in the stable state.
//! Both steps notify the listener. A single-stage operation takes both steps
//! in one call. All status participants resolve synchronously; their work is
//! also available as a [`StageEffect`] for hosts that complete stages later.

mod models;
mod service;

pub use models::{InterfaceState, LinkState, NodeState};
pub use service::LayeredService;

use crate::lifecycle::{DoneCallback, Lifecycle, StageResult};
use crate::operation::{Operation, OperationKind};
use crate::LifecycleError;
use serde::Serialize;

// =============================================================================
// CHANGE NOTIFICATION
// =============================================================================

/// A status transition, as delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// Label of the participant (usually its component path).
    pub label: String,
    /// Status domain ("node", "interface", "link", "service").
    pub domain: &'static str,
    /// Status before the transition.
    pub from: &'static str,
    /// Status after the transition.
    pub to: &'static str,
}

/// Receives status transitions.
pub type StatusListener = Box<dyn FnMut(&StatusChange)>;

// =============================================================================
// STAGE EFFECT
// =============================================================================

/// The synchronous work a reference participant does for one stage.
///
/// Separating the effect from the completion signal lets a host run the
/// effect later and hand the callback back itself.
pub trait StageEffect {
    /// Perform the work of `stage` of `operation`.
    fn apply(&mut self, operation: &Operation, stage: usize);

    /// Status name after the effects applied so far.
    fn current_status(&self) -> &'static str;
}

// =============================================================================
// STATUS MODEL
// =============================================================================

/// The four-state machine of one status domain.
pub trait StatusModel: Copy + Eq + std::fmt::Debug + 'static {
    /// Domain name used in notifications.
    const DOMAIN: &'static str;
    /// Operation that brings the domain into service.
    const START: OperationKind;
    /// Operation that takes the domain out of service.
    const STOP: OperationKind;
    /// Stable in-service state.
    const UP: Self;
    /// Stable out-of-service state.
    const DOWN: Self;
    /// Transitional state while starting.
    const GOING_UP: Self;
    /// Transitional state while stopping.
    const GOING_DOWN: Self;

    /// Status name.
    fn name(self) -> &'static str;

    /// Parse a status from its name.
    fn from_name(name: &str) -> Option<Self>;

    /// State entered at once when an incident of `kind` hits the domain.
    fn on_incident(_kind: OperationKind) -> Option<Self> {
        None
    }
}

// =============================================================================
// STATUS PARTICIPANT
// =============================================================================

/// A status state machine taking part in lifecycle operations.
pub struct StatusParticipant<S: StatusModel> {
    label: String,
    status: S,
    listener: Option<StatusListener>,
}

/// Node power status.
pub type NodeStatus = StatusParticipant<NodeState>;
/// Interface status.
pub type InterfaceStatus = StatusParticipant<InterfaceState>;
/// Link status.
pub type LinkStatus = StatusParticipant<LinkState>;

impl<S: StatusModel> std::fmt::Debug for StatusParticipant<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusParticipant")
            .field("label", &self.label)
            .field("status", &self.status)
            .finish()
    }
}

impl<S: StatusModel> StatusParticipant<S> {
    /// Create a participant in the given initial status.
    #[must_use]
    pub fn new(label: impl Into<String>, initial: S) -> Self {
        Self {
            label: label.into(),
            status: initial,
            listener: None,
        }
    }

    /// Create a participant from a status name.
    pub fn from_status_name(label: impl Into<String>, name: &str) -> Result<Self, LifecycleError> {
        let status = S::from_name(name).ok_or_else(|| unknown_status::<S>(name))?;
        Ok(Self::new(label, status))
    }

    /// Attach a listener that receives every transition.
    #[must_use]
    pub fn with_listener(mut self, listener: StatusListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> S {
        self.status
    }

    /// Participant label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Force a status, notifying the listener.
    pub fn set_status(&mut self, status: S) {
        if status == self.status {
            return;
        }
        let change = StatusChange {
            label: self.label.clone(),
            domain: S::DOMAIN,
            from: self.status.name(),
            to: status.name(),
        };
        self.status = status;
        tracing::info!(
            component = %change.label,
            domain = change.domain,
            from = change.from,
            to = change.to,
            "status changed"
        );
        if let Some(listener) = self.listener.as_mut() {
            listener(&change);
        }
    }

    /// Force a status by name.
    pub fn set_status_by_name(&mut self, name: &str) -> Result<(), LifecycleError> {
        let status = S::from_name(name).ok_or_else(|| unknown_status::<S>(name))?;
        self.set_status(status);
        Ok(())
    }
}

impl<S: StatusModel> StageEffect for StatusParticipant<S> {
    fn apply(&mut self, operation: &Operation, stage: usize) {
        let kind = operation.kind();
        // Both checks run so a single-stage operation takes both steps.
        if kind == S::START {
            if stage == 0 {
                self.set_status(S::GOING_UP);
            }
            if operation.is_last_stage(stage) {
                self.set_status(S::UP);
            }
        } else if kind == S::STOP {
            if stage == 0 {
                self.set_status(S::GOING_DOWN);
            }
            if operation.is_last_stage(stage) {
                self.set_status(S::DOWN);
            }
        } else if stage == 0 {
            if let Some(status) = S::on_incident(kind) {
                self.set_status(status);
            }
        }
    }

    fn current_status(&self) -> &'static str {
        self.status.name()
    }
}

impl<S: StatusModel> Lifecycle for StatusParticipant<S> {
    fn initiate_state_change(
        &mut self,
        operation: &Operation,
        stage: usize,
        _done: DoneCallback,
    ) -> StageResult {
        self.apply(operation, stage);
        StageResult::Done
    }

    fn status_name(&self) -> Option<&'static str> {
        Some(self.current_status())
    }
}

fn unknown_status<S: StatusModel>(name: &str) -> LifecycleError {
    LifecycleError::ConfigError(format!("unknown {} status '{}'", S::DOMAIN, name))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use crate::{CallbackId, ComponentId, ProcessId};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn token() -> DoneCallback {
        DoneCallback::new(CallbackId(0), ProcessId(0), ComponentId(0))
    }

    fn recorder() -> (Rc<RefCell<Vec<StatusChange>>>, StatusListener) {
        let seen: Rc<RefCell<Vec<StatusChange>>> = Rc::default();
        let sink = Rc::clone(&seen);
        (seen, Box::new(move |change| sink.borrow_mut().push(change.clone())))
    }

    fn run_all(participant: &mut dyn Lifecycle, operation: &Operation) {
        for stage in 0..operation.stage_count() {
            let result = participant.initiate_state_change(operation, stage, token());
            assert_eq!(result, StageResult::Done);
        }
    }

    #[test]
    fn node_turns_off_through_transitional_state() {
        let (seen, listener) = recorder();
        let mut node = NodeStatus::new("net.host1.status", NodeState::On).with_listener(listener);
        let op = Operation::new(OperationKind::TurnNodeOff);

        node.initiate_state_change(&op, 0, token());
        assert_eq!(node.status(), NodeState::TurningOff);

        for stage in 1..5 {
            node.initiate_state_change(&op, stage, token());
            assert_eq!(node.status(), NodeState::TurningOff);
        }

        node.initiate_state_change(&op, 5, token());
        assert_eq!(node.status(), NodeState::Off);

        let names: Vec<_> = seen.borrow().iter().map(|c| c.to).collect();
        assert_eq!(names, vec!["turning off", "off"]);
        assert_eq!(seen.borrow()[0].from, "on");
        assert_eq!(seen.borrow()[0].domain, "node");
    }

    #[test]
    fn single_stage_takes_both_steps() {
        let (seen, listener) = recorder();
        let mut iface =
            InterfaceStatus::new("eth0", InterfaceState::Down).with_listener(listener);

        run_all(&mut iface, &Operation::new(OperationKind::BringInterfaceUp));

        assert_eq!(iface.status(), InterfaceState::Up);
        let names: Vec<_> = seen.borrow().iter().map(|c| c.to).collect();
        assert_eq!(names, vec!["bringing up", "up"]);
    }

    #[test]
    fn link_ignores_foreign_operations() {
        let (seen, listener) = recorder();
        let mut link = LinkStatus::new("wire", LinkState::PluggedIn).with_listener(listener);

        run_all(&mut link, &Operation::new(OperationKind::TurnNodeOff));
        run_all(&mut link, &Operation::new(OperationKind::BringInterfaceDown));
        assert_eq!(link.status(), LinkState::PluggedIn);
        assert!(seen.borrow().is_empty());

        run_all(&mut link, &Operation::new(OperationKind::UnplugLink));
        assert_eq!(link.status(), LinkState::Unplugged);
        assert_eq!(link.status_name(), Some("unplugged"));
    }

    #[test]
    fn node_failure_is_immediate() {
        let mut node = NodeStatus::new("host", NodeState::On);
        run_all(&mut node, &Operation::new(OperationKind::FailNode));
        assert_eq!(node.status(), NodeState::Off);

        let mut iface = InterfaceStatus::new("eth0", InterfaceState::Up);
        run_all(&mut iface, &Operation::new(OperationKind::FailNode));
        assert_eq!(iface.status(), InterfaceState::Up);
    }

    #[test]
    fn stretched_operation_settles_on_its_last_stage() {
        let mut node = NodeStatus::new("host", NodeState::Off);
        let op = Operation::with_stage_count(OperationKind::TurnNodeOn, 4).expect("op");

        for stage in 0..3 {
            node.initiate_state_change(&op, stage, token());
            assert_eq!(node.status(), NodeState::TurningOn);
        }
        node.initiate_state_change(&op, 3, token());
        assert_eq!(node.status(), NodeState::On);
    }

    #[test]
    fn status_by_name() {
        let mut node = NodeStatus::from_status_name("host", "turning on").expect("parse");
        assert_eq!(node.status(), NodeState::TurningOn);

        node.set_status_by_name("off").expect("set");
        assert_eq!(node.status(), NodeState::Off);

        let err = node.set_status_by_name("sleeping").expect_err("unknown");
        assert_eq!(
            err,
            LifecycleError::ConfigError("unknown node status 'sleeping'".into())
        );
        assert!(LinkStatus::from_status_name("wire", "up").is_err());
    }

    #[test]
    fn repeated_status_is_not_notified() {
        let (seen, listener) = recorder();
        let mut node = NodeStatus::new("host", NodeState::Off).with_listener(listener);
        node.set_status(NodeState::Off);
        assert!(seen.borrow().is_empty());
        assert_eq!(node.label(), "host");
    }
}
