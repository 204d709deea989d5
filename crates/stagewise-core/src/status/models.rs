//! The three status domains.

use super::StatusModel;
use crate::operation::OperationKind;
use serde::{Deserialize, Serialize};

/// Power status of a network node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Powered and running.
    On,
    /// Powered down, or crashed by a failure.
    Off,
    /// A start is in progress.
    TurningOn,
    /// A shutdown is in progress.
    TurningOff,
}

impl StatusModel for NodeState {
    const DOMAIN: &'static str = "node";
    const START: OperationKind = OperationKind::TurnNodeOn;
    const STOP: OperationKind = OperationKind::TurnNodeOff;
    const UP: Self = NodeState::On;
    const DOWN: Self = NodeState::Off;
    const GOING_UP: Self = NodeState::TurningOn;
    const GOING_DOWN: Self = NodeState::TurningOff;

    fn name(self) -> &'static str {
        match self {
            NodeState::On => "on",
            NodeState::Off => "off",
            NodeState::TurningOn => "turning on",
            NodeState::TurningOff => "turning off",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "on" => Some(NodeState::On),
            "off" => Some(NodeState::Off),
            "turning on" => Some(NodeState::TurningOn),
            "turning off" => Some(NodeState::TurningOff),
            _ => None,
        }
    }

    fn on_incident(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::FailNode => Some(NodeState::Off),
            _ => None,
        }
    }
}

/// Status of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceState {
    /// Carrying traffic.
    Up,
    /// Administratively down.
    Down,
    /// Being brought up.
    BringingUp,
    /// Being brought down.
    BringingDown,
}

impl StatusModel for InterfaceState {
    const DOMAIN: &'static str = "interface";
    const START: OperationKind = OperationKind::BringInterfaceUp;
    const STOP: OperationKind = OperationKind::BringInterfaceDown;
    const UP: Self = InterfaceState::Up;
    const DOWN: Self = InterfaceState::Down;
    const GOING_UP: Self = InterfaceState::BringingUp;
    const GOING_DOWN: Self = InterfaceState::BringingDown;

    fn name(self) -> &'static str {
        match self {
            InterfaceState::Up => "up",
            InterfaceState::Down => "down",
            InterfaceState::BringingUp => "bringing up",
            InterfaceState::BringingDown => "bringing down",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(InterfaceState::Up),
            "down" => Some(InterfaceState::Down),
            "bringing up" => Some(InterfaceState::BringingUp),
            "bringing down" => Some(InterfaceState::BringingDown),
            _ => None,
        }
    }
}

/// Status of a link (channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// Connected at both ends.
    PluggedIn,
    /// Disconnected.
    Unplugged,
    /// Being plugged in.
    PluggingIn,
    /// Being unplugged.
    Unplugging,
}

impl StatusModel for LinkState {
    const DOMAIN: &'static str = "link";
    const START: OperationKind = OperationKind::PlugInLink;
    const STOP: OperationKind = OperationKind::UnplugLink;
    const UP: Self = LinkState::PluggedIn;
    const DOWN: Self = LinkState::Unplugged;
    const GOING_UP: Self = LinkState::PluggingIn;
    const GOING_DOWN: Self = LinkState::Unplugging;

    fn name(self) -> &'static str {
        match self {
            LinkState::PluggedIn => "plugged in",
            LinkState::Unplugged => "unplugged",
            LinkState::PluggingIn => "plugging in",
            LinkState::Unplugging => "unplugging",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "plugged in" => Some(LinkState::PluggedIn),
            "unplugged" => Some(LinkState::Unplugged),
            "plugging in" => Some(LinkState::PluggingIn),
            "unplugging" => Some(LinkState::Unplugging),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<S: StatusModel>(states: [S; 4]) {
        for state in states {
            assert_eq!(S::from_name(state.name()), Some(state));
        }
    }

    #[test]
    fn names_round_trip() {
        round_trip([
            NodeState::On,
            NodeState::Off,
            NodeState::TurningOn,
            NodeState::TurningOff,
        ]);
        round_trip([
            InterfaceState::Up,
            InterfaceState::Down,
            InterfaceState::BringingUp,
            InterfaceState::BringingDown,
        ]);
        round_trip([
            LinkState::PluggedIn,
            LinkState::Unplugged,
            LinkState::PluggingIn,
            LinkState::Unplugging,
        ]);
    }

    #[test]
    fn only_nodes_react_to_failure() {
        assert_eq!(
            NodeState::on_incident(OperationKind::FailNode),
            Some(NodeState::Off)
        );
        assert_eq!(InterfaceState::on_incident(OperationKind::FailNode), None);
        assert_eq!(LinkState::on_incident(OperationKind::FailNode), None);
    }
}
