//! Layered service participant.
//!
//! A service belongs to one protocol layer and only acts during the stage its
//! layer maps to: node start runs it at its layer's bottom-up position, node
//! shutdown stops it at its top-down position. A node failure stops it at
//! once.

use super::{StageEffect, StatusChange, StatusListener};
use crate::lifecycle::{DoneCallback, Lifecycle, StageResult};
use crate::operation::{Layer, Operation, OperationKind};

const RUNNING: &str = "running";
const STOPPED: &str = "stopped";

/// A service (routing daemon, MAC, traffic source, ...) bound to a layer.
pub struct LayeredService {
    label: String,
    layer: Layer,
    running: bool,
    listener: Option<StatusListener>,
}

impl std::fmt::Debug for LayeredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredService")
            .field("label", &self.label)
            .field("layer", &self.layer)
            .field("running", &self.running)
            .finish()
    }
}

impl LayeredService {
    /// Create a service on `layer`.
    #[must_use]
    pub fn new(label: impl Into<String>, layer: Layer, running: bool) -> Self {
        Self {
            label: label.into(),
            layer,
            running,
            listener: None,
        }
    }

    /// Attach a listener that receives start/stop transitions.
    #[must_use]
    pub fn with_listener(mut self, listener: StatusListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Layer this service lives on.
    #[must_use]
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Whether the service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    fn set_running(&mut self, running: bool) {
        if running == self.running {
            return;
        }
        let change = StatusChange {
            label: self.label.clone(),
            domain: "service",
            from: state_name(self.running),
            to: state_name(running),
        };
        self.running = running;
        tracing::info!(
            component = %change.label,
            layer = %self.layer,
            to = change.to,
            "service {}",
            change.to
        );
        if let Some(listener) = self.listener.as_mut() {
            listener(&change);
        }
    }
}

impl StageEffect for LayeredService {
    fn apply(&mut self, operation: &Operation, stage: usize) {
        let at_my_layer = operation.stage_of(self.layer) == Some(stage);
        match operation.kind() {
            OperationKind::TurnNodeOn if at_my_layer => self.set_running(true),
            OperationKind::TurnNodeOff if at_my_layer => self.set_running(false),
            OperationKind::FailNode if stage == 0 => self.set_running(false),
            _ => {}
        }
    }

    fn current_status(&self) -> &'static str {
        state_name(self.running)
    }
}

impl Lifecycle for LayeredService {
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

fn state_name(running: bool) -> &'static str {
    if running { RUNNING } else { STOPPED }
}
