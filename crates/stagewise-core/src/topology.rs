//! # Component Topology
//!
//! The controller walks components through the [`Topology`] trait and is
//! agnostic to how the tree is stored. [`ComponentTree`] is the in-memory
//! implementation used by the binary and the tests.
//!
//! Paths are dot-separated component names starting at a root, e.g.
//! `net.host1.eth0`.

use crate::lifecycle::Lifecycle;
use crate::{ComponentId, LifecycleError};
use std::collections::BTreeMap;

// =============================================================================
// TOPOLOGY TRAIT
// =============================================================================

/// Structural access to a tree of components.
pub trait Topology {
    /// Whether `id` names a component.
    fn contains(&self, id: ComponentId) -> bool;

    /// Children of `id` in declared order. Unknown ids have no children.
    fn children(&self, id: ComponentId) -> &[ComponentId];

    /// The capability of `id`, if it implements [`Lifecycle`].
    fn participant(&mut self, id: ComponentId) -> Option<&mut dyn Lifecycle>;

    /// Resolve a hierarchical path to a component.
    fn resolve(&self, path: &str) -> Option<ComponentId>;
}

// =============================================================================
// COMPONENT TREE
// =============================================================================

struct ComponentNode {
    name: String,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    participant: Option<Box<dyn Lifecycle>>,
}

impl std::fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("participant", &self.participant.is_some())
            .finish()
    }
}

/// In-memory component tree.
///
/// Uses `BTreeMap` for node storage; children keep their insertion order.
/// Several roots may coexist.
#[derive(Debug, Default)]
pub struct ComponentTree {
    nodes: BTreeMap<ComponentId, ComponentNode>,
    roots: Vec<ComponentId>,
    next_id: u64,
}

impl ComponentTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root component.
    pub fn add_root(
        &mut self,
        name: &str,
        participant: Option<Box<dyn Lifecycle>>,
    ) -> Result<ComponentId, LifecycleError> {
        validate_name(name)?;
        if self.root_named(name).is_some() {
            return Err(LifecycleError::DuplicateComponent(name.to_string()));
        }
        let id = self.allocate(name, None, participant);
        self.roots.push(id);
        Ok(id)
    }

    /// Add a child under `parent`, after its existing children.
    pub fn add_child(
        &mut self,
        parent: ComponentId,
        name: &str,
        participant: Option<Box<dyn Lifecycle>>,
    ) -> Result<ComponentId, LifecycleError> {
        validate_name(name)?;
        if !self.nodes.contains_key(&parent) {
            return Err(LifecycleError::ComponentNotFound(parent));
        }
        if self.child_named(parent, name).is_some() {
            let path = self.path_of(parent).unwrap_or_default();
            return Err(LifecycleError::DuplicateComponent(format!("{path}.{name}")));
        }
        let id = self.allocate(name, Some(parent), participant);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    /// Return the component at `path`, creating it and any missing ancestors
    /// as plain components.
    pub fn ensure_path(&mut self, path: &str) -> Result<ComponentId, LifecycleError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = match self.root_named(first) {
            Some(id) => id,
            None => self
                .add_root(first, None)
                .map_err(|_| LifecycleError::InvalidPath(path.to_string()))?,
        };
        for segment in segments {
            current = match self.child_named(current, segment) {
                Some(id) => id,
                None => self
                    .add_child(current, segment, None)
                    .map_err(|_| LifecycleError::InvalidPath(path.to_string()))?,
            };
        }
        Ok(current)
    }

    /// Install (or replace) the capability of an existing component.
    pub fn set_participant(
        &mut self,
        id: ComponentId,
        participant: Box<dyn Lifecycle>,
    ) -> Result<(), LifecycleError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(LifecycleError::ComponentNotFound(id))?;
        node.participant = Some(participant);
        Ok(())
    }

    /// Full dot-separated path of `id`.
    #[must_use]
    pub fn path_of(&self, id: ComponentId) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        Some(names.join("."))
    }

    /// Local name of `id`.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.nodes.get(&id).map(|node| node.name.as_str())
    }

    /// Parent of `id`; `None` for roots and unknown ids.
    #[must_use]
    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Root components in insertion order.
    #[must_use]
    pub fn roots(&self) -> &[ComponentId] {
        &self.roots
    }

    /// Whether `id` implements the capability contract.
    #[must_use]
    pub fn is_participant(&self, id: ComponentId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node| node.participant.is_some())
    }

    /// Status name reported by the capability of `id`, if any.
    #[must_use]
    pub fn status_of(&self, id: ComponentId) -> Option<&'static str> {
        self.nodes
            .get(&id)
            .and_then(|node| node.participant.as_ref())
            .and_then(|participant| participant.status_name())
    }

    /// Components below and including `root`, in pre-order.
    #[must_use]
    pub fn descendants(&self, root: ComponentId) -> Vec<ComponentId> {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn allocate(
        &mut self,
        name: &str,
        parent: Option<ComponentId>,
        participant: Option<Box<dyn Lifecycle>>,
    ) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.nodes.insert(
            id,
            ComponentNode {
                name: name.to_string(),
                parent,
                children: Vec::new(),
                participant,
            },
        );
        id
    }

    fn root_named(&self, name: &str) -> Option<ComponentId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.name(*id) == Some(name))
    }

    fn child_named(&self, parent: ComponentId, name: &str) -> Option<ComponentId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.name(*id) == Some(name))
    }
}

impl Topology for ComponentTree {
    fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    fn participant(&mut self, id: ComponentId) -> Option<&mut dyn Lifecycle> {
        match self.nodes.get_mut(&id)?.participant.as_mut() {
            Some(participant) => Some(&mut **participant),
            None => None,
        }
    }

    fn resolve(&self, path: &str) -> Option<ComponentId> {
        let mut segments = path.split('.');
        let mut current = self.root_named(segments.next()?)?;
        for segment in segments {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }
}

/// Component names are non-empty and free of path separators.
fn validate_name(name: &str) -> Result<(), LifecycleError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(LifecycleError::InvalidPath(name.to_string()));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{DoneCallback, StageResult};
    use crate::operation::Operation;

    struct Noop;

    impl Lifecycle for Noop {
        fn initiate_state_change(
            &mut self,
            _operation: &Operation,
            _stage: usize,
            _done: DoneCallback,
        ) -> StageResult {
            StageResult::Done
        }

        fn status_name(&self) -> Option<&'static str> {
            Some("idle")
        }
    }

    fn sample_tree() -> (ComponentTree, ComponentId, ComponentId, ComponentId) {
        let mut tree = ComponentTree::new();
        let net = tree.add_root("net", None).expect("root");
        let host = tree.add_child(net, "host1", None).expect("host");
        let eth = tree
            .add_child(host, "eth0", Some(Box::new(Noop)))
            .expect("eth");
        (tree, net, host, eth)
    }

    #[test]
    fn resolve_walks_names() {
        let (tree, net, host, eth) = sample_tree();
        assert_eq!(tree.resolve("net"), Some(net));
        assert_eq!(tree.resolve("net.host1"), Some(host));
        assert_eq!(tree.resolve("net.host1.eth0"), Some(eth));
        assert_eq!(tree.resolve("net.host2"), None);
        assert_eq!(tree.resolve(""), None);
    }

    #[test]
    fn path_of_inverts_resolve() {
        let (tree, _, _, eth) = sample_tree();
        assert_eq!(tree.path_of(eth).as_deref(), Some("net.host1.eth0"));
        assert_eq!(tree.path_of(ComponentId(99)), None);
    }

    #[test]
    fn children_keep_declared_order() {
        let mut tree = ComponentTree::new();
        let root = tree.add_root("r", None).expect("root");
        let b = tree.add_child(root, "b", None).expect("b");
        let a = tree.add_child(root, "a", None).expect("a");
        assert_eq!(tree.children(root), &[b, a]);
        assert!(tree.children(ComponentId(42)).is_empty());
    }

    #[test]
    fn duplicate_and_malformed_names_rejected() {
        let (mut tree, net, _, _) = sample_tree();
        assert_eq!(
            tree.add_child(net, "host1", None),
            Err(LifecycleError::DuplicateComponent("net.host1".into()))
        );
        assert_eq!(
            tree.add_root("net", None),
            Err(LifecycleError::DuplicateComponent("net".into()))
        );
        assert_eq!(
            tree.add_child(net, "a.b", None),
            Err(LifecycleError::InvalidPath("a.b".into()))
        );
        assert_eq!(
            tree.add_child(ComponentId(77), "x", None),
            Err(LifecycleError::ComponentNotFound(ComponentId(77)))
        );
    }

    #[test]
    fn ensure_path_creates_missing_ancestors() {
        let (mut tree, _, host, _) = sample_tree();
        let before = tree.len();

        let existing = tree.ensure_path("net.host1").expect("existing");
        assert_eq!(existing, host);
        assert_eq!(tree.len(), before);

        let router = tree.ensure_path("lab.router.ppp0").expect("created");
        assert_eq!(tree.len(), before + 3);
        assert_eq!(tree.path_of(router).as_deref(), Some("lab.router.ppp0"));
        assert_eq!(tree.roots().len(), 2);

        assert!(matches!(
            tree.ensure_path("lab..x"),
            Err(LifecycleError::InvalidPath(_))
        ));
    }

    #[test]
    fn participants_and_status() {
        let (mut tree, net, host, eth) = sample_tree();
        assert!(!tree.is_participant(host));
        assert!(tree.is_participant(eth));
        assert!(tree.participant(host).is_none());
        assert!(tree.participant(eth).is_some());
        assert_eq!(tree.status_of(eth), Some("idle"));
        assert_eq!(tree.status_of(net), None);

        tree.set_participant(host, Box::new(Noop)).expect("set");
        assert!(tree.is_participant(host));
    }

    #[test]
    fn descendants_are_pre_order() {
        let mut tree = ComponentTree::new();
        let r = tree.add_root("r", None).expect("r");
        let a = tree.add_child(r, "a", None).expect("a");
        let b = tree.add_child(r, "b", None).expect("b");
        let c = tree.add_child(b, "c", None).expect("c");
        let a1 = tree.add_child(a, "a1", None).expect("a1");

        assert_eq!(tree.descendants(r), vec![r, a, a1, b, c]);
        assert_eq!(tree.descendants(b), vec![b, c]);
        assert_eq!(tree.parent(c), Some(b));
        assert_eq!(tree.parent(r), None);
    }
}
