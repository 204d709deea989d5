//! # Scenario Documents
//!
//! A scenario declares a component tree and a list of timed commands.
//!
//! ```toml
//! [[component]]
//! path = "net.host1.status"
//! kind = "node-status"
//! initial = "on"
//!
//! [[component]]
//! path = "net.host1.routing"
//! kind = "service"
//! layer = "network"
//! delay = 3
//!
//! [[command]]
//! at = 10
//! target = "net.host1"
//! operation = "turn-node-off"
//! ```
//!
//! Ancestors named in a path are created as plain components. Children keep
//! the order in which their paths first appear.

use serde::{Deserialize, Serialize};
use stagewise_core::{
    ComponentTree, InterfaceStatus, Layer, LayeredService, Lifecycle, LifecycleError, LinkStatus,
    NodeStatus, OperationRegistry, StageEffect, StatusListener, Topology,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum scenario file size (4 MB).
///
/// Scenarios are hand-written documents; anything larger is a mistake.
pub const MAX_SCENARIO_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LifecycleError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LifecycleError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LifecycleError::ConfigError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate a scenario path.
///
/// Canonicalizes the path (resolving symlinks and "..") and requires a
/// regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, LifecycleError> {
    let canonical = path.canonicalize().map_err(|e| {
        LifecycleError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LifecycleError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// What a declared component does during lifecycle operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// No capability; only structure.
    #[default]
    Plain,
    /// Node power status.
    NodeStatus,
    /// Interface status.
    InterfaceStatus,
    /// Link status.
    LinkStatus,
    /// Service bound to a protocol layer.
    Service,
}

/// One `[[component]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// Dot-separated component path.
    pub path: String,
    /// Component kind.
    #[serde(default)]
    pub kind: ComponentKind,
    /// Initial status name (kind-specific).
    #[serde(default)]
    pub initial: Option<String>,
    /// Protocol layer; services only.
    #[serde(default)]
    pub layer: Option<Layer>,
    /// Ticks each stage takes to complete; 0 completes at once.
    #[serde(default)]
    pub delay: u64,
    /// Report every stage pending and never complete.
    #[serde(default)]
    pub hold: bool,
}

/// One `[[command]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledCommand {
    /// Tick at which the command is executed.
    #[serde(default)]
    pub at: u64,
    /// Dot-separated path of the subtree root.
    pub target: String,
    /// Registered operation name.
    pub operation: String,
}

/// A complete scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Declared components.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentSpec>,
    /// Timed commands.
    #[serde(default, rename = "command")]
    pub commands: Vec<ScheduledCommand>,
}

/// Result of validating a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    /// Components in the built tree, implicit ancestors included.
    pub components: usize,
    /// Components with a capability.
    pub participants: usize,
    /// Scheduled commands.
    pub commands: usize,
    /// Tick of the last scheduled command.
    pub last_command_at: Option<u64>,
}

// =============================================================================
// COMPONENT ENTRIES
// =============================================================================

impl ComponentSpec {
    /// Whether this component implements the capability contract.
    #[must_use]
    pub fn is_participant(&self) -> bool {
        self.kind != ComponentKind::Plain
    }

    /// Check that the fields make sense for the kind.
    pub fn check(&self) -> Result<(), LifecycleError> {
        let problem = match self.kind {
            ComponentKind::Plain
                if self.initial.is_some() || self.layer.is_some() || self.delay > 0 || self.hold =>
            {
                Some("a plain component takes no initial, layer, delay or hold")
            }
            ComponentKind::Service if self.layer.is_none() => Some("a service requires a layer"),
            ComponentKind::NodeStatus | ComponentKind::InterfaceStatus | ComponentKind::LinkStatus
                if self.layer.is_some() =>
            {
                Some("only services take a layer")
            }
            _ => None,
        };
        match problem {
            Some(problem) => Err(LifecycleError::ConfigError(format!(
                "component '{}': {}",
                self.path, problem
            ))),
            None => Ok(()),
        }
    }

    /// Build the stage work of this component, or `None` for plain ones.
    pub fn effect(
        &self,
        listener: Option<StatusListener>,
    ) -> Result<Option<Box<dyn StageEffect>>, LifecycleError> {
        self.check()?;
        let label = self.path.clone();
        let initial = self.initial.as_deref();

        let effect: Box<dyn StageEffect> = match self.kind {
            ComponentKind::Plain => return Ok(None),
            ComponentKind::NodeStatus => {
                let status = NodeStatus::from_status_name(label, initial.unwrap_or("on"))?;
                Box::new(attach(status, listener, NodeStatus::with_listener))
            }
            ComponentKind::InterfaceStatus => {
                let status = InterfaceStatus::from_status_name(label, initial.unwrap_or("up"))?;
                Box::new(attach(status, listener, InterfaceStatus::with_listener))
            }
            ComponentKind::LinkStatus => {
                let status = LinkStatus::from_status_name(label, initial.unwrap_or("plugged in"))?;
                Box::new(attach(status, listener, LinkStatus::with_listener))
            }
            ComponentKind::Service => {
                let layer = self.layer.ok_or_else(|| {
                    LifecycleError::ConfigError(format!(
                        "component '{}': a service requires a layer",
                        self.path
                    ))
                })?;
                let running = match initial.unwrap_or("running") {
                    "running" => true,
                    "stopped" => false,
                    other => {
                        return Err(LifecycleError::ConfigError(format!(
                            "unknown service status '{}'",
                            other
                        )));
                    }
                };
                let service = LayeredService::new(label, layer, running);
                Box::new(attach(service, listener, LayeredService::with_listener))
            }
        };
        Ok(Some(effect))
    }
}

fn attach<P>(participant: P, listener: Option<StatusListener>, with: fn(P, StatusListener) -> P) -> P {
    match listener {
        Some(listener) => with(participant, listener),
        None => participant,
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

impl Scenario {
    /// Parse a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, LifecycleError> {
        toml::from_str(text).map_err(|e| LifecycleError::ConfigError(e.to_string()))
    }

    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self, LifecycleError> {
        let canonical = validate_file_path(path)?;
        validate_file_size(&canonical, MAX_SCENARIO_FILE_SIZE)?;

        let text = std::fs::read_to_string(&canonical)
            .map_err(|e| LifecycleError::IoError(format!("Cannot read '{}': {}", path.display(), e)))?;

        tracing::debug!(path = %canonical.display(), bytes = text.len(), "scenario loaded");
        Self::from_toml_str(&text)
    }

    /// Build the component tree, asking `participant` for the capability of
    /// every declared component.
    pub fn build_tree<F>(&self, mut participant: F) -> Result<ComponentTree, LifecycleError>
    where
        F: FnMut(&ComponentSpec) -> Result<Option<Box<dyn Lifecycle>>, LifecycleError>,
    {
        let mut tree = ComponentTree::new();
        let mut declared = BTreeSet::new();

        for spec in &self.components {
            if !declared.insert(spec.path.as_str()) {
                return Err(LifecycleError::DuplicateComponent(spec.path.clone()));
            }
            let id = tree.ensure_path(&spec.path)?;
            if let Some(capability) = participant(spec)? {
                tree.set_participant(id, capability)?;
            }
        }

        Ok(tree)
    }

    /// Check the whole scenario without running it.
    ///
    /// Every component must build and every command must name an existing
    /// target and a registered operation.
    pub fn validate(&self, registry: &OperationRegistry) -> Result<ScenarioSummary, LifecycleError> {
        let tree = self.build_tree(|spec| spec.effect(None).map(|_| None))?;

        for command in &self.commands {
            if tree.resolve(&command.target).is_none() {
                return Err(LifecycleError::NotFound(command.target.clone()));
            }
            registry.create(&command.operation)?;
        }

        Ok(ScenarioSummary {
            components: tree.len(),
            participants: self.components.iter().filter(|c| c.is_participant()).count(),
            commands: self.commands.len(),
            last_command_at: self.commands.iter().map(|c| c.at).max(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[component]]
        path = "net.host1.status"
        kind = "node-status"

        [[component]]
        path = "net.host1.routing"
        kind = "service"
        layer = "network"
        delay = 2

        [[component]]
        path = "net.wire"
        kind = "link-status"
        initial = "unplugged"

        [[command]]
        at = 5
        target = "net.host1"
        operation = "turn-node-off"
    "#;

    #[test]
    fn parses_components_and_commands() {
        let scenario = Scenario::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(scenario.components.len(), 3);
        assert_eq!(scenario.components[1].kind, ComponentKind::Service);
        assert_eq!(scenario.components[1].layer, Some(Layer::Network));
        assert_eq!(scenario.components[1].delay, 2);
        assert_eq!(scenario.commands[0].at, 5);
        assert_eq!(scenario.commands[0].operation, "turn-node-off");
    }

    #[test]
    fn validate_counts_implicit_ancestors() {
        let scenario = Scenario::from_toml_str(SAMPLE).expect("parse");
        let summary = scenario
            .validate(&OperationRegistry::with_defaults())
            .expect("valid");

        // net, host1, status, routing, wire
        assert_eq!(summary.components, 5);
        assert_eq!(summary.participants, 3);
        assert_eq!(summary.commands, 1);
        assert_eq!(summary.last_command_at, Some(5));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Scenario::from_toml_str("[[component]]\npath = \"a\"\ncolour = \"red\"\n")
            .expect_err("unknown field");
        assert!(matches!(err, LifecycleError::ConfigError(_)));
    }

    #[test]
    fn service_without_layer_is_rejected() {
        let spec = ComponentSpec {
            path: "host.app".into(),
            kind: ComponentKind::Service,
            initial: None,
            layer: None,
            delay: 0,
            hold: false,
        };
        assert!(matches!(spec.check(), Err(LifecycleError::ConfigError(_))));
    }

    #[test]
    fn plain_component_takes_no_delay() {
        let scenario = Scenario::from_toml_str("[[component]]\npath = \"a\"\ndelay = 3\n")
            .expect("parse");
        let err = scenario
            .validate(&OperationRegistry::with_defaults())
            .expect_err("plain with delay");
        assert!(err.to_string().contains("plain component"));
    }

    #[test]
    fn bad_initial_status_is_reported() {
        let scenario = Scenario::from_toml_str(
            "[[component]]\npath = \"h\"\nkind = \"node-status\"\ninitial = \"asleep\"\n",
        )
        .expect("parse");
        let err = scenario
            .validate(&OperationRegistry::with_defaults())
            .expect_err("bad status");
        assert_eq!(
            err,
            LifecycleError::ConfigError("unknown node status 'asleep'".into())
        );
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let scenario =
            Scenario::from_toml_str("[[component]]\npath = \"a.b\"\n\n[[component]]\npath = \"a.b\"\n")
                .expect("parse");
        let err = scenario
            .validate(&OperationRegistry::with_defaults())
            .expect_err("duplicate");
        assert_eq!(err, LifecycleError::DuplicateComponent("a.b".into()));
    }

    #[test]
    fn ancestor_may_be_declared_after_descendant() {
        let scenario = Scenario::from_toml_str(
            "[[component]]\npath = \"h.eth0\"\nkind = \"interface-status\"\n\n[[component]]\npath = \"h\"\nkind = \"node-status\"\n",
        )
        .expect("parse");
        let summary = scenario
            .validate(&OperationRegistry::with_defaults())
            .expect("valid");
        assert_eq!(summary.components, 2);
        assert_eq!(summary.participants, 2);
    }

    #[test]
    fn commands_are_checked_target_first() {
        let registry = OperationRegistry::with_defaults();
        let scenario = Scenario::from_toml_str(
            "[[component]]\npath = \"h\"\n\n[[command]]\ntarget = \"x\"\noperation = \"warp\"\n",
        )
        .expect("parse");
        assert_eq!(
            scenario.validate(&registry),
            Err(LifecycleError::NotFound("x".into()))
        );

        let scenario = Scenario::from_toml_str(
            "[[component]]\npath = \"h\"\n\n[[command]]\ntarget = \"h\"\noperation = \"warp\"\n",
        )
        .expect("parse");
        assert_eq!(
            scenario.validate(&registry),
            Err(LifecycleError::UnknownOperation("warp".into()))
        );
    }

    #[test]
    fn malformed_paths_are_rejected() {
        let scenario = Scenario::from_toml_str("[[component]]\npath = \"a..b\"\n").expect("parse");
        assert!(matches!(
            scenario.validate(&OperationRegistry::with_defaults()),
            Err(LifecycleError::InvalidPath(_))
        ));
    }
}
