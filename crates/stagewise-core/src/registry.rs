//! # Operation Registry
//!
//! Maps operation type names to factories, so declarative commands can name an
//! operation by string. Names are kept in a `BTreeMap` for deterministic
//! listing.

use crate::operation::{Direction, Operation, OperationKind};
use crate::LifecycleError;
use std::collections::BTreeMap;

/// Builds a fresh operation instance.
pub type OperationFactory = fn() -> Operation;

/// Name → factory lookup for operations.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    factories: BTreeMap<String, OperationFactory>,
}

impl OperationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in operation kind.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtins: [(OperationKind, OperationFactory); 10] = [
            (OperationKind::TurnNodeOn, || {
                Operation::new(OperationKind::TurnNodeOn)
            }),
            (OperationKind::TurnNodeOff, || {
                Operation::new(OperationKind::TurnNodeOff)
            }),
            (OperationKind::BringInterfaceUp, || {
                Operation::new(OperationKind::BringInterfaceUp)
            }),
            (OperationKind::BringInterfaceDown, || {
                Operation::new(OperationKind::BringInterfaceDown)
            }),
            (OperationKind::PlugInLink, || {
                Operation::new(OperationKind::PlugInLink)
            }),
            (OperationKind::UnplugLink, || {
                Operation::new(OperationKind::UnplugLink)
            }),
            (OperationKind::FailNode, || {
                Operation::new(OperationKind::FailNode)
            }),
            (OperationKind::Generic(Direction::Up), || {
                Operation::new(OperationKind::Generic(Direction::Up))
            }),
            (OperationKind::Generic(Direction::Down), || {
                Operation::new(OperationKind::Generic(Direction::Down))
            }),
            (OperationKind::Generic(Direction::Incident), || {
                Operation::new(OperationKind::Generic(Direction::Incident))
            }),
        ];
        for (kind, factory) in builtins {
            registry.factories.insert(kind.name().to_string(), factory);
        }
        registry
    }

    /// Register a factory under `name`.
    ///
    /// Names are unique; registering the same name twice is an error.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: OperationFactory,
    ) -> Result<(), LifecycleError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(LifecycleError::DuplicateOperation(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build the operation registered under `name`.
    pub fn create(&self, name: &str) -> Result<Operation, LifecycleError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| LifecycleError::UnknownOperation(name.to_string()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no operation is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
