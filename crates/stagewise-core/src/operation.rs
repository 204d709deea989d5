//! # Lifecycle Operations
//!
//! An [`Operation`] describes a requested transition: which kind of change is
//! being made and how many stages it takes. Operations are immutable once
//! built and are owned by the process that runs them.
//!
//! ## Stage Ordering
//!
//! Node operations walk the protocol layers in mirrored order, so no layer
//! loses a lower dependency before finishing its own teardown and no layer
//! starts before its dependency is ready:
//!
//! | Stage | TurnNodeOn | TurnNodeOff |
//! |-------|------------|-------------|
//! | 0 | Local | Local |
//! | 1 | Physical | Application |
//! | 2 | Link | Transport |
//! | 3 | Network | Network |
//! | 4 | Transport | Link |
//! | 5 | Application | Physical |
//!
//! Every other operation has a single `Local` stage.

use crate::LifecycleError;
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE TABLES
// =============================================================================

/// Protocol layer visited by a staged node operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// Node-local bookkeeping (status modules).
    Local,
    /// Radios and transmission media.
    Physical,
    /// MAC and interface registration.
    Link,
    /// Addressing and routing.
    Network,
    /// Connection state.
    Transport,
    /// Traffic generators and daemons.
    Application,
}

impl Layer {
    /// Lower-case layer name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Local => "local",
            Layer::Physical => "physical",
            Layer::Link => "link",
            Layer::Network => "network",
            Layer::Transport => "transport",
            Layer::Application => "application",
        }
    }

    /// Parse a layer from its lower-case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Layer> {
        match name {
            "local" => Some(Layer::Local),
            "physical" => Some(Layer::Physical),
            "link" => Some(Layer::Link),
            "network" => Some(Layer::Network),
            "transport" => Some(Layer::Transport),
            "application" => Some(Layer::Application),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bottom-up order used when turning a node on.
pub const NODE_START_LAYERS: [Layer; 6] = [
    Layer::Local,
    Layer::Physical,
    Layer::Link,
    Layer::Network,
    Layer::Transport,
    Layer::Application,
];

/// Top-down order used when turning a node off.
pub const NODE_SHUTDOWN_LAYERS: [Layer; 6] = [
    Layer::Local,
    Layer::Application,
    Layer::Transport,
    Layer::Network,
    Layer::Link,
    Layer::Physical,
];

/// Order used by single-stage operations.
pub const LOCAL_ONLY: [Layer; 1] = [Layer::Local];

// =============================================================================
// OPERATION KIND
// =============================================================================

/// Broad category of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Bring something into service.
    Up,
    /// Take something out of service in an orderly way.
    Down,
    /// Unplanned loss of service (crash, failure).
    Incident,
}

/// Discriminant of a concrete operation.
///
/// Participants dispatch on this value instead of inspecting types at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Power a network node on, layer by layer from the bottom.
    TurnNodeOn,
    /// Power a network node off, layer by layer from the top.
    TurnNodeOff,
    /// Bring a network interface up.
    BringInterfaceUp,
    /// Bring a network interface down.
    BringInterfaceDown,
    /// Plug a link back in.
    PlugInLink,
    /// Unplug a link.
    UnplugLink,
    /// Crash a node: everything stops at once, without an orderly teardown.
    FailNode,
    /// An operation with no special staging.
    Generic(Direction),
}

impl OperationKind {
    /// The registry name of this kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::TurnNodeOn => "turn-node-on",
            OperationKind::TurnNodeOff => "turn-node-off",
            OperationKind::BringInterfaceUp => "bring-interface-up",
            OperationKind::BringInterfaceDown => "bring-interface-down",
            OperationKind::PlugInLink => "plug-in-link",
            OperationKind::UnplugLink => "unplug-link",
            OperationKind::FailNode => "fail-node",
            OperationKind::Generic(Direction::Up) => "up",
            OperationKind::Generic(Direction::Down) => "down",
            OperationKind::Generic(Direction::Incident) => "incident",
        }
    }

    /// Direction of this kind.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            OperationKind::TurnNodeOn
            | OperationKind::BringInterfaceUp
            | OperationKind::PlugInLink => Direction::Up,
            OperationKind::TurnNodeOff
            | OperationKind::BringInterfaceDown
            | OperationKind::UnplugLink => Direction::Down,
            OperationKind::FailNode => Direction::Incident,
            OperationKind::Generic(direction) => *direction,
        }
    }

    /// Layer ordering table for this kind.
    #[must_use]
    pub fn layers(&self) -> &'static [Layer] {
        match self {
            OperationKind::TurnNodeOn => &NODE_START_LAYERS,
            OperationKind::TurnNodeOff => &NODE_SHUTDOWN_LAYERS,
            _ => &LOCAL_ONLY,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// OPERATION
// =============================================================================

/// A requested transition and its total stage count.
///
/// Deserialization goes through [`Operation::with_stage_count`], so a
/// decoded operation never has zero stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OperationRepr")]
pub struct Operation {
    kind: OperationKind,
    stage_count: usize,
}

/// Unchecked wire form of [`Operation`].
#[derive(Deserialize)]
struct OperationRepr {
    kind: OperationKind,
    stage_count: usize,
}

impl TryFrom<OperationRepr> for Operation {
    type Error = LifecycleError;

    fn try_from(repr: OperationRepr) -> Result<Self, Self::Error> {
        Self::with_stage_count(repr.kind, repr.stage_count)
    }
}

impl Operation {
    /// Create an operation with the stage count its ordering table defines.
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            stage_count: kind.layers().len(),
        }
    }

    /// Create an operation with an explicit stage count.
    ///
    /// Used to stretch or shrink a kind, e.g. a four-stage node start in
    /// tests. Stages past the end of the layer table map to no layer.
    pub fn with_stage_count(kind: OperationKind, stage_count: usize) -> Result<Self, LifecycleError> {
        if stage_count == 0 {
            return Err(LifecycleError::InvalidStageCount(stage_count));
        }
        Ok(Self { kind, stage_count })
    }

    /// The operation discriminant.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Total number of stages (always at least 1).
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Shorthand for `kind().direction()`.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// Whether `stage` is the last stage of this operation.
    #[must_use]
    pub fn is_last_stage(&self, stage: usize) -> bool {
        stage + 1 == self.stage_count
    }

    /// Layer handled at `stage`, if the ordering table covers it.
    #[must_use]
    pub fn layer_at(&self, stage: usize) -> Option<Layer> {
        if stage >= self.stage_count {
            return None;
        }
        self.kind.layers().get(stage).copied()
    }

    /// Stage at which `layer` is handled, if this operation visits it.
    #[must_use]
    pub fn stage_of(&self, layer: Layer) -> Option<usize> {
        self.kind
            .layers()
            .iter()
            .position(|l| *l == layer)
            .filter(|stage| *stage < self.stage_count)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} stages)", self.kind, self.stage_count)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_operations_have_six_stages() {
        assert_eq!(Operation::new(OperationKind::TurnNodeOn).stage_count(), 6);
        assert_eq!(Operation::new(OperationKind::TurnNodeOff).stage_count(), 6);
    }

    #[test]
    fn unstaged_operations_default_to_one_stage() {
        for kind in [
            OperationKind::BringInterfaceUp,
            OperationKind::BringInterfaceDown,
            OperationKind::PlugInLink,
            OperationKind::UnplugLink,
            OperationKind::FailNode,
            OperationKind::Generic(Direction::Down),
        ] {
            let op = Operation::new(kind);
            assert_eq!(op.stage_count(), 1, "{kind}");
            assert!(op.is_last_stage(0));
        }
    }

    #[test]
    fn shutdown_mirrors_startup() {
        let up = Operation::new(OperationKind::TurnNodeOn);
        let down = Operation::new(OperationKind::TurnNodeOff);

        assert_eq!(up.layer_at(0), Some(Layer::Local));
        assert_eq!(down.layer_at(0), Some(Layer::Local));

        let up_tail: Vec<_> = (1..6).filter_map(|s| up.layer_at(s)).collect();
        let mut down_tail: Vec<_> = (1..6).filter_map(|s| down.layer_at(s)).collect();
        down_tail.reverse();
        assert_eq!(up_tail, down_tail);
    }

    #[test]
    fn stage_of_inverts_layer_at() {
        let down = Operation::new(OperationKind::TurnNodeOff);
        for stage in 0..down.stage_count() {
            let layer = down.layer_at(stage).expect("layer");
            assert_eq!(down.stage_of(layer), Some(stage));
        }
    }

    #[test]
    fn custom_stage_count_truncates_layer_table() {
        let op = Operation::with_stage_count(OperationKind::TurnNodeOn, 4).expect("op");
        assert_eq!(op.stage_count(), 4);
        assert_eq!(op.layer_at(3), Some(Layer::Network));
        assert_eq!(op.layer_at(4), None);
        assert_eq!(op.stage_of(Layer::Application), None);
        assert!(op.is_last_stage(3));
    }

    #[test]
    fn zero_stages_rejected() {
        let result = Operation::with_stage_count(OperationKind::FailNode, 0);
        assert_eq!(result, Err(LifecycleError::InvalidStageCount(0)));
    }

    #[test]
    fn directions() {
        assert_eq!(OperationKind::TurnNodeOn.direction(), Direction::Up);
        assert_eq!(OperationKind::UnplugLink.direction(), Direction::Down);
        assert_eq!(OperationKind::FailNode.direction(), Direction::Incident);
        assert_eq!(
            OperationKind::Generic(Direction::Incident).direction(),
            Direction::Incident
        );
    }

    #[test]
    fn layer_names_round_trip() {
        for layer in NODE_START_LAYERS {
            assert_eq!(Layer::from_name(layer.name()), Some(layer));
        }
        assert_eq!(Layer::from_name("session"), None);
    }

    #[test]
    fn decoding_rejects_zero_stages() {
        let err = serde_json::from_str::<Operation>(r#"{"kind":"turn-node-off","stage_count":0}"#)
            .expect_err("zero stages");
        assert!(err.to_string().contains("stage count"));

        let op: Operation = serde_json::from_str(r#"{"kind":"turn-node-off","stage_count":4}"#)
            .expect("four stages");
        assert_eq!(op.stage_count(), 4);
        assert_eq!(op.layer_at(3), Some(Layer::Network));
    }
}
