// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene graph with ownership, dirty-marking and cascaded invalidation.
//!
//! Every visual entity lives in a [`Scene`] arena and is addressed by a
//! [`SceneKey`]. Two relations connect scene nodes:
//!
//! - **ownership**: each node has at most one parent and an ordered list of
//!   children. Ownership drives destruction and render traversal.
//! - **links**: a node may link any other node so that marking it dirty
//!   also marks the linked node. Links drive invalidation only and may
//!   cross ownership subtrees.
//!
//! Marked nodes are queued and rendered on the next [`Scene::render_frame`].

use crate::config::EditorConfig;
use crate::edge::Edge;
use crate::graph_node::{GraphNode, GroupNode};
use crate::port::Port;
use crate::surface::{ElementHandle, ElementKind, Surface, Visual};
use crate::view::ViewTransform;
use egui::Pos2;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Arena key of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey(u64);

impl SceneKey {
    /// Build a key from its raw value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scene graph errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// Another mounted node already uses this id
    #[error("Key conflict: id {0:?} is already registered")]
    DuplicateId(String),

    /// A child was added before its parent started mounting
    #[error("Cannot add a child to {0:?} before it is mounted")]
    ConstructionPhaseViolation(String),

    /// The node was already mounted or bound to an element
    #[error("Node {0:?} is already bound")]
    BindConflict(String),

    /// The key does not belong to a live node
    #[error("Unknown scene node {0}")]
    UnknownNode(SceneKey),
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;

/// The kind-specific part of a scene node
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// Layer container
    Group(GroupNode),
    /// User-placed node
    Graph(GraphNode),
    /// Port on a node
    Port(Port),
    /// Connection between ports
    Edge(Edge),
}

impl Entity {
    /// Entity id, used as the registry key
    pub fn id(&self) -> &str {
        match self {
            Self::Group(group) => group.id(),
            Self::Graph(node) => node.id(),
            Self::Port(port) => port.id(),
            Self::Edge(edge) => edge.id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MountPhase {
    Unmounted,
    Mounting,
    Mounted,
}

/// A node in the scene arena
#[derive(Debug, Clone)]
pub struct SceneNode {
    entity: Entity,
    parent: Option<SceneKey>,
    children: Vec<SceneKey>,
    links: IndexSet<SceneKey>,
    link_sources: IndexSet<SceneKey>,
    element: Option<ElementHandle>,
    phase: MountPhase,
    dirty: bool,
    destroyed: bool,
}

impl SceneNode {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            parent: None,
            children: Vec::new(),
            links: IndexSet::new(),
            link_sources: IndexSet::new(),
            element: None,
            phase: MountPhase::Unmounted,
            dirty: false,
            destroyed: false,
        }
    }

    /// Node id
    pub fn id(&self) -> &str {
        self.entity.id()
    }

    /// Kind-specific data
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Owning parent
    pub fn parent(&self) -> Option<SceneKey> {
        self.parent
    }

    /// Owned children in insertion order
    pub fn children(&self) -> &[SceneKey] {
        &self.children
    }

    /// Nodes invalidated when this node is marked
    pub fn links(&self) -> impl Iterator<Item = SceneKey> + '_ {
        self.links.iter().copied()
    }

    /// Nodes whose marks invalidate this node
    pub fn link_sources(&self) -> impl Iterator<Item = SceneKey> + '_ {
        self.link_sources.iter().copied()
    }

    /// Bound backend element
    pub fn element(&self) -> Option<ElementHandle> {
        self.element
    }

    /// Whether a render is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether mounting has completed
    pub fn is_mounted(&self) -> bool {
        self.phase == MountPhase::Mounted
    }

    /// Whether the node has been removed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The graph node, if this is one
    pub fn as_graph_node(&self) -> Option<&GraphNode> {
        match &self.entity {
            Entity::Graph(node) => Some(node),
            _ => None,
        }
    }

    /// The port, if this is one
    pub fn as_port(&self) -> Option<&Port> {
        match &self.entity {
            Entity::Port(port) => Some(port),
            _ => None,
        }
    }

    /// The edge, if this is one
    pub fn as_edge(&self) -> Option<&Edge> {
        match &self.entity {
            Entity::Edge(edge) => Some(edge),
            _ => None,
        }
    }
}

/// Work done by one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Queue entries in the snapshot
    pub queued: usize,
    /// Update hooks that ran
    pub updated: usize,
}

/// Arena of scene nodes plus the id registry and render queue
pub struct Scene<S> {
    surface: S,
    nodes: IndexMap<SceneKey, SceneNode>,
    registry: IndexMap<String, SceneKey>,
    queue: Vec<SceneKey>,
    /// Port lookup by rendered element, for hit testing
    port_elements: HashMap<ElementHandle, SceneKey>,
    view: ViewTransform,
    edge_tangent: f32,
    next_key: u64,
    updates: usize,
}

impl<S: Surface> Scene<S> {
    /// Create an empty scene rendering into `surface`
    pub fn new(surface: S, config: &EditorConfig) -> Self {
        Self {
            surface,
            nodes: IndexMap::new(),
            registry: IndexMap::new(),
            queue: Vec::new(),
            port_elements: HashMap::new(),
            view: ViewTransform::IDENTITY,
            edge_tangent: config.edges.tangent,
            next_key: 1,
            updates: 0,
        }
    }

    /// The rendering backend
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The rendering backend, mutably
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Current view transform
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Replace the view transform and forward it to the surface
    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
        self.surface.set_view(view);
    }

    /// Look up a live node
    pub fn node(&self, key: SceneKey) -> Option<&SceneNode> {
        self.nodes.get(&key)
    }

    /// Live nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (SceneKey, &SceneNode)> {
        self.nodes.iter().map(|(key, node)| (*key, node))
    }

    /// Resolve a registered id
    pub fn lookup(&self, id: &str) -> Option<SceneKey> {
        self.registry.get(id).copied()
    }

    /// Resolve a registered id to its node
    pub fn resolve(&self, id: &str) -> Option<&SceneNode> {
        self.lookup(id).and_then(|key| self.nodes.get(&key))
    }

    /// Resolve a rendered element to the port it belongs to
    pub fn port_at(&self, element: ElementHandle) -> Option<SceneKey> {
        self.port_elements.get(&element).copied()
    }

    /// Resolve a rendered element to the graph node drawn into it
    pub fn graph_node_at(&self, element: ElementHandle) -> Option<SceneKey> {
        self.nodes
            .iter()
            .find(|(_, node)| node.element == Some(element) && node.as_graph_node().is_some())
            .map(|(key, _)| *key)
    }

    /// Number of live nodes, mounted or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of pending queue entries
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Add an unmounted node to the arena
    pub fn insert(&mut self, entity: Entity) -> SceneKey {
        let key = SceneKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(key, SceneNode::new(entity));
        key
    }

    /// Mount a node: register it, bind ownership, mark it and build its
    /// backend element
    ///
    /// A node mounts once; a second call fails with
    /// [`SceneError::BindConflict`]. If the mount hook fails, the partially
    /// mounted node is torn down before the error is returned.
    pub fn mount(
        &mut self,
        key: SceneKey,
        parent: Option<SceneKey>,
        container: Option<ElementHandle>,
    ) -> Result<()> {
        let node = self.nodes.get(&key).ok_or(SceneError::UnknownNode(key))?;
        let id = node.id().to_string();
        if node.phase != MountPhase::Unmounted {
            return Err(SceneError::BindConflict(id));
        }
        if self.registry.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }

        self.registry.insert(id.clone(), key);
        let container = container.or_else(|| parent.and_then(|p| self.nodes.get(&p)?.element));
        if let Some(node) = self.nodes.get_mut(&key) {
            node.phase = MountPhase::Mounting;
            node.parent = parent;
        }
        self.mark(key);

        if let Err(err) = self.on_mount(key, container) {
            tracing::debug!("Mount of {:?} failed: {}", id, err);
            self.remove(key);
            return Err(err);
        }

        if let Some(node) = self.nodes.get_mut(&key) {
            node.phase = MountPhase::Mounted;
        }
        tracing::trace!("Mounted {:?} as {}", id, key);
        Ok(())
    }

    /// Mount `child` under `parent` and append it to the parent's children
    pub fn add_child(
        &mut self,
        parent: SceneKey,
        container: Option<ElementHandle>,
        child: SceneKey,
    ) -> Result<()> {
        let node = self.nodes.get(&parent).ok_or(SceneError::UnknownNode(parent))?;
        if node.phase == MountPhase::Unmounted {
            return Err(SceneError::ConstructionPhaseViolation(node.id().to_string()));
        }

        self.mount(child, Some(parent), container)?;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        self.mark(child);
        Ok(())
    }

    /// Bind a backend element to a node
    pub fn bind(&mut self, key: SceneKey, element: ElementHandle) -> Result<()> {
        let node = self.nodes.get_mut(&key).ok_or(SceneError::UnknownNode(key))?;
        if node.element.is_some() {
            return Err(SceneError::BindConflict(node.id().to_string()));
        }
        node.element = Some(element);
        Ok(())
    }

    /// Mark a node dirty and cascade across its links
    ///
    /// Each node is visited at most once per call, so cyclic links end.
    pub fn mark(&mut self, key: SceneKey) {
        let mut visited = HashSet::new();
        self.mark_cascade(key, &mut visited);
    }

    fn mark_cascade(&mut self, key: SceneKey, visited: &mut HashSet<SceneKey>) {
        if !visited.insert(key) {
            return;
        }
        let Some(node) = self.nodes.get_mut(&key) else {
            return;
        };
        node.dirty = true;
        let links: Vec<_> = node.links.iter().copied().collect();
        self.queue.push(key);

        for linked in links {
            if visited.contains(&linked) {
                continue;
            }
            self.on_link_marked(linked);
            self.mark_cascade(linked, visited);
        }
    }

    /// Make marks on `from` invalidate `to`
    pub fn link(&mut self, from: SceneKey, to: SceneKey) {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(&from) {
            node.links.insert(to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.link_sources.insert(from);
        }
    }

    /// Remove a link made with [`link`](Self::link)
    pub fn unlink(&mut self, from: SceneKey, to: SceneKey) {
        if let Some(node) = self.nodes.get_mut(&from) {
            node.links.shift_remove(&to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.link_sources.shift_remove(&from);
        }
    }

    /// Render a dirty node and its owned subtree
    ///
    /// Only called from [`render_frame`](Self::render_frame), which owns the
    /// queue entries of the nodes it renders.
    pub(crate) fn render(&mut self, key: SceneKey) {
        let Some(node) = self.nodes.get_mut(&key) else {
            return;
        };
        if !node.dirty {
            return;
        }
        // Cleared first so a mark raised by the update hook survives.
        node.dirty = false;

        self.update(key);

        let children = self
            .nodes
            .get(&key)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            self.render(child);
        }
    }

    /// Drain the render queue and render every node in the snapshot
    ///
    /// Marks raised while rendering land in the next frame.
    pub fn render_frame(&mut self) -> FrameStats {
        let snapshot = std::mem::take(&mut self.queue);
        let before = self.updates;
        for key in &snapshot {
            // Marked again during this pass: left for the next frame
            if self.queue.contains(key) {
                continue;
            }
            self.render(*key);
        }
        let stats = FrameStats {
            queued: snapshot.len(),
            updated: self.updates - before,
        };
        if stats.queued > 0 {
            tracing::trace!("Rendered frame: {} queued, {} updated", stats.queued, stats.updated);
        }
        stats
    }

    /// Tear down a node and everything it owns
    ///
    /// Returns the removed node on the first call and `None` on later
    /// calls for the same key.
    pub fn remove(&mut self, key: SceneKey) -> Option<SceneNode> {
        let node = self.nodes.get(&key)?;
        let id = node.id().to_string();
        let element = node.element;
        let parent = node.parent;

        if self.registry.get(&id) == Some(&key) {
            self.registry.shift_remove(&id);
        }

        if let Some(element) = element {
            self.on_destroy(key, element);
            self.surface.remove(element);
        }

        let node = self.nodes.get_mut(&key)?;
        let links = std::mem::take(&mut node.links);
        let sources = std::mem::take(&mut node.link_sources);
        let children = std::mem::take(&mut node.children);
        for linked in links {
            if let Some(node) = self.nodes.get_mut(&linked) {
                node.link_sources.shift_remove(&key);
            }
        }
        for source in sources {
            self.unlink(source, key);
        }
        for child in children {
            self.remove(child);
        }

        if let Some(parent) = parent {
            let detached = self.nodes.get_mut(&parent).is_some_and(|p| {
                let before = p.children.len();
                p.children.retain(|c| *c != key);
                p.children.len() != before
            });
            if detached {
                self.mark(parent);
            }
        }

        self.queue.retain(|k| *k != key);
        let mut node = self.nodes.shift_remove(&key)?;
        node.dirty = false;
        node.destroyed = true;
        tracing::trace!("Removed {:?}", id);
        Some(node)
    }

    /// Kind-specific data, mutably
    pub(crate) fn entity_mut(&mut self, key: SceneKey) -> Option<&mut Entity> {
        self.nodes.get_mut(&key).map(|node| &mut node.entity)
    }

    pub(crate) fn edge_mut(&mut self, key: SceneKey) -> Option<&mut Edge> {
        match self.entity_mut(key)? {
            Entity::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub(crate) fn graph_node_mut(&mut self, key: SceneKey) -> Option<&mut GraphNode> {
        match self.entity_mut(key)? {
            Entity::Graph(node) => Some(node),
            _ => None,
        }
    }

    /// Graph-space point where edges attach to a port
    pub fn anchor(&self, port: SceneKey) -> Option<Pos2> {
        let node = self.nodes.get(&port)?;
        let direction = node.as_port()?.direction();
        let bounds = self.surface.bounds(node.element?)?;
        Some(self.view.to_graph(direction.anchor(bounds)))
    }

    /// The node owning a port
    pub fn owner_of(&self, port: SceneKey) -> Option<SceneKey> {
        self.nodes.get(&port)?.as_port()?.owner()
    }

    fn on_mount(&mut self, key: SceneKey, container: Option<ElementHandle>) -> Result<()> {
        let kind = match self.nodes.get(&key).map(|node| &node.entity) {
            Some(Entity::Group(_)) => ElementKind::Layer,
            Some(Entity::Graph(_)) => ElementKind::Node,
            Some(Entity::Port(port)) => ElementKind::Port {
                direction: port.direction(),
                index: port.index(),
            },
            Some(Entity::Edge(_)) => ElementKind::Edge,
            None => return Err(SceneError::UnknownNode(key)),
        };
        let element = self.surface.create(container, kind);
        self.bind(key, element)?;

        match kind {
            ElementKind::Layer => {}
            ElementKind::Node => {
                let ports = self
                    .graph_node_mut(key)
                    .map(GraphNode::take_pending)
                    .unwrap_or_default();
                for port in ports {
                    let direction = port.direction();
                    let port_key = self.insert(Entity::Port(port));
                    if let Err(err) = self.add_child(key, Some(element), port_key) {
                        self.nodes.shift_remove(&port_key);
                        return Err(err);
                    }
                    if let Some(node) = self.graph_node_mut(key) {
                        node.push_port(direction, port_key);
                    }
                }
            }
            ElementKind::Port { .. } => {
                let owner = self.nodes.get(&key).and_then(|node| node.parent);
                if let Some(Entity::Port(port)) = self.entity_mut(key) {
                    port.set_owner(owner);
                }
                if let Some(owner) = owner {
                    self.link(owner, key);
                }
                self.port_elements.insert(element, key);
            }
            ElementKind::Edge => {
                if let Some(edge) = self.nodes.get(&key).and_then(SceneNode::as_edge) {
                    let (source, target) = (edge.source(), edge.target());
                    self.link(source, key);
                    if let Some(target) = target {
                        self.link(target, key);
                    }
                }
                self.calc_edge_position(key);
            }
        }
        Ok(())
    }

    fn update(&mut self, key: SceneKey) {
        let Some(element) = self.nodes.get(&key).and_then(|node| node.element) else {
            return;
        };
        self.updates += 1;
        self.calc_edge_position(key);
        if let Some(visual) = self.visual(key) {
            self.surface.update(element, &visual);
        }
        self.mark_stale_edges(key);
    }

    /// Re-mark edges that rendered against a port's previous bounds
    ///
    /// An edge rendered earlier in the same frame than the node owning its
    /// port keeps the old endpoint; the mark lands in the next frame.
    fn mark_stale_edges(&mut self, key: SceneKey) {
        let Some(node) = self.nodes.get(&key).filter(|node| node.as_port().is_some()) else {
            return;
        };
        let Some(anchor) = self.anchor(key) else {
            return;
        };
        let stale: Vec<_> = node
            .links
            .iter()
            .copied()
            .filter(|linked| {
                let Some(edge) = self
                    .nodes
                    .get(linked)
                    .filter(|n| !n.dirty)
                    .and_then(SceneNode::as_edge)
                else {
                    return false;
                };
                let end = if edge.source() == key {
                    edge.source_point()
                } else {
                    edge.target_point()
                };
                edge.touches(key) && end != anchor
            })
            .collect();
        for edge in stale {
            self.mark(edge);
        }
    }

    fn visual(&self, key: SceneKey) -> Option<Visual> {
        match &self.nodes.get(&key)?.entity {
            Entity::Group(_) => None,
            Entity::Graph(node) => Some(Visual::Node {
                title: node.title().to_string(),
                position: node.position(),
                active: node.is_active(),
                focus: node.has_focus(),
            }),
            Entity::Port(port) => Some(Visual::Port {
                label: port.label().to_string(),
                data_types: port.data_types().to_vec(),
            }),
            Entity::Edge(edge) => {
                let source = self.nodes.get(&edge.source())?.as_port()?;
                Some(Visual::Edge {
                    points: edge.path(source.direction(), self.edge_tangent),
                    connected: edge.is_connected(),
                    data_types: source.data_types().to_vec(),
                })
            }
        }
    }

    fn on_link_marked(&mut self, key: SceneKey) {
        if matches!(self.nodes.get(&key).map(|n| &n.entity), Some(Entity::Edge(_))) {
            self.calc_edge_position(key);
        }
    }

    fn on_destroy(&mut self, key: SceneKey, element: ElementHandle) {
        if self.port_elements.get(&element) == Some(&key) {
            self.port_elements.remove(&element);
        }
    }

    /// Refresh an edge's bound endpoints from its ports' current bounds
    fn calc_edge_position(&mut self, key: SceneKey) {
        let Some(edge) = self.nodes.get(&key).and_then(SceneNode::as_edge) else {
            return;
        };
        let from = self.anchor(edge.source());
        let to = edge.target().and_then(|target| self.anchor(target));
        if let Some(edge) = self.edge_mut(key) {
            if let Some(from) = from {
                edge.from = from;
            }
            if let Some(to) = to {
                edge.to = to;
            }
        }
    }
}

impl<S> fmt::Debug for Scene<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("registered", &self.registry.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
