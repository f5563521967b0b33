// SPDX-License-Identifier: MIT OR Apache-2.0
//! The public face of the editor surface.
//!
//! [`Host`] owns the scene, the connection index and the edge gesture. It
//! mounts two layers at construction (edges below, nodes above), exposes
//! add/remove/connect to application code and turns pointer events into
//! gesture transitions or node drags.

use crate::config::EditorConfig;
use crate::connectivity::{ConnectError, Connectivity};
use crate::gesture::{CancelReason, EdgeGesture, GestureOutcome};
use crate::graph_node::{GraphNode, GroupNode};
use crate::port::Port;
use crate::scene::{Entity, FrameStats, Scene, SceneError, SceneKey, SceneNode};
use crate::surface::{ElementHandle, Surface};
use crate::view::ViewTransform;
use egui::{Pos2, Vec2};

/// A pointer event at the host boundary, in screen space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Pointer pressed on a port element
    PortPressed {
        /// Element under the pointer
        element: ElementHandle,
        /// Pointer position
        position: Pos2,
    },
    /// Pointer pressed on a node body
    NodePressed {
        /// Element under the pointer
        element: ElementHandle,
        /// Pointer position
        position: Pos2,
    },
    /// Pointer moved
    Moved {
        /// Pointer position
        position: Pos2,
    },
    /// Pointer released, over a port element or over nothing
    Released {
        /// Element under the pointer
        element: Option<ElementHandle>,
    },
}

/// A node body being dragged
#[derive(Debug, Clone, Copy, PartialEq)]
struct NodeDrag {
    node: SceneKey,
    /// Pointer offset from the node position, in graph space
    grab: Vec2,
}

/// Editor host
pub struct Host<S: Surface> {
    scene: Scene<S>,
    links: Connectivity,
    gesture: EdgeGesture,
    node_drag: Option<NodeDrag>,
    node_layer: SceneKey,
    config: EditorConfig,
    focused: Option<SceneKey>,
    destroyed: bool,
}

impl<S: Surface> Host<S> {
    /// Create a host rendering into `surface`
    pub fn new(surface: S, config: EditorConfig) -> Result<Self, SceneError> {
        let mut scene = Scene::new(surface, &config);

        let edge_layer = scene.insert(Entity::Group(GroupNode::new()));
        scene.mount(edge_layer, None, None)?;
        let node_layer = scene.insert(Entity::Group(GroupNode::new()));
        scene.mount(node_layer, None, None)?;
        scene.set_view(config.initial_view());

        tracing::info!("Editor host created");
        Ok(Self {
            scene,
            links: Connectivity::new(edge_layer),
            gesture: EdgeGesture::new(),
            node_drag: None,
            node_layer,
            config,
            focused: None,
            destroyed: false,
        })
    }

    /// Add a node and its ports to the node layer
    pub fn add(&mut self, node: GraphNode) -> Result<SceneKey, SceneError> {
        let id = node.id().to_string();
        let key = self.scene.insert(Entity::Graph(node));
        if let Err(err) = self.scene.add_child(self.node_layer, None, key) {
            self.scene.remove(key);
            return Err(err);
        }
        tracing::debug!("Added node {:?}", id);
        Ok(key)
    }

    /// Remove a node, its ports and every connection touching them
    ///
    /// Returns `false` if `key` is not a live node.
    pub fn remove(&mut self, key: SceneKey) -> bool {
        let Some(node) = self.scene.node(key).and_then(SceneNode::as_graph_node) else {
            return false;
        };
        let ports: Vec<_> = node.ports().collect();

        if self
            .gesture
            .anchor()
            .is_some_and(|anchor| ports.contains(&anchor))
        {
            self.gesture.cancel(&mut self.scene, CancelReason::AnchorRemoved);
        }
        for port in &ports {
            for edge in self.links.links_touching(*port) {
                self.links.remove_link(&mut self.scene, edge);
            }
        }
        if self.focused == Some(key) {
            self.focused = None;
        }
        if self.node_drag.is_some_and(|drag| drag.node == key) {
            self.node_drag = None;
        }

        let removed = self.scene.remove(key);
        if let Some(node) = &removed {
            tracing::debug!("Removed node {:?}", node.id());
        }
        removed.is_some()
    }

    /// Connect two ports by id, in either order
    pub fn connect(&mut self, source_id: &str, target_id: &str) -> Result<SceneKey, ConnectError> {
        self.links.connect(&mut self.scene, source_id, target_id)
    }

    /// Remove the connection feeding an input port
    pub fn disconnect(&mut self, input_id: &str) -> bool {
        let Some(link) = self
            .scene
            .lookup(input_id)
            .and_then(|input| self.links.link_for_input(input))
        else {
            return false;
        };
        self.links.remove_link(&mut self.scene, link.edge).is_some()
    }

    /// Look up any registered scene node by id
    pub fn get_node(&self, id: &str) -> Option<&SceneNode> {
        self.scene.resolve(id)
    }

    /// Look up a graph node by id
    pub fn graph_node(&self, id: &str) -> Option<&GraphNode> {
        self.get_node(id)?.as_graph_node()
    }

    /// Look up a port by id
    pub fn port(&self, id: &str) -> Option<&Port> {
        self.get_node(id)?.as_port()
    }

    /// Move a node; attached edges follow on the next frame
    pub fn move_node(&mut self, key: SceneKey, position: Pos2) -> bool {
        self.modify(key, |node| node.set_position(position))
    }

    /// Change a node's title
    pub fn set_title(&mut self, key: SceneKey, title: impl Into<String>) -> bool {
        let title = title.into();
        self.modify(key, |node| node.set_title(title))
    }

    /// Change a node's active flag
    pub fn set_active(&mut self, key: SceneKey, active: bool) -> bool {
        self.modify(key, |node| node.set_active(active))
    }

    /// Give focus to one node, taking it from the previous one
    pub fn focus_node(&mut self, key: Option<SceneKey>) {
        if self.focused == key {
            return;
        }
        if let Some(previous) = self.focused.take() {
            self.modify(previous, |node| node.set_focus(false));
        }
        if let Some(key) = key {
            if self.modify(key, |node| node.set_focus(true)) {
                self.focused = Some(key);
            }
        }
    }

    /// The focused node
    pub fn focused(&self) -> Option<SceneKey> {
        self.focused
    }

    fn modify(&mut self, key: SceneKey, f: impl FnOnce(&mut GraphNode)) -> bool {
        let Some(node) = self.scene.graph_node_mut(key) else {
            return false;
        };
        f(node);
        self.scene.mark(key);
        true
    }

    /// Apply a pan/zoom transform, clamped to the configured zoom extent
    pub fn set_view(&mut self, view: ViewTransform) {
        let view = view.clamped(self.config.view.min_zoom, self.config.view.max_zoom);
        self.scene.set_view(view);
    }

    /// Current view transform
    pub fn view(&self) -> ViewTransform {
        self.scene.view()
    }

    /// Render everything marked since the last frame
    pub fn frame(&mut self) -> FrameStats {
        if self.destroyed {
            return FrameStats::default();
        }
        self.scene.render_frame()
    }

    /// Feed one pointer event to the edge gesture or the node drag
    ///
    /// Events consumed by a node drag report [`GestureOutcome::Ignored`].
    pub fn pointer(&mut self, event: PointerEvent) -> GestureOutcome {
        match event {
            PointerEvent::PortPressed { element, position } => self.port_pressed(element, position),
            PointerEvent::NodePressed { element, position } => {
                self.node_pressed(element, position);
                GestureOutcome::Ignored
            }
            PointerEvent::Moved { position } => self.pointer_moved(position),
            PointerEvent::Released { element } => self.pointer_released(element),
        }
    }

    /// Pointer pressed on a rendered port element
    pub fn port_pressed(&mut self, element: ElementHandle, position: Pos2) -> GestureOutcome {
        if self.destroyed || self.node_drag.is_some() {
            return GestureOutcome::Ignored;
        }
        let Some(port) = self.scene.port_at(element) else {
            return GestureOutcome::Ignored;
        };
        self.gesture
            .press(&mut self.scene, &mut self.links, port, position)
    }

    /// Pointer pressed on a rendered node body
    ///
    /// Focuses the node and starts dragging it. Returns `false` while an
    /// edge gesture is pending or when `element` is not a node body.
    pub fn node_pressed(&mut self, element: ElementHandle, position: Pos2) -> bool {
        if self.destroyed || self.gesture.is_pending() {
            return false;
        }
        let Some(node) = self.scene.graph_node_at(element) else {
            return false;
        };
        let Some(origin) = self.scene.node(node).and_then(SceneNode::as_graph_node).map(GraphNode::position) else {
            return false;
        };
        self.focus_node(Some(node));
        self.node_drag = Some(NodeDrag {
            node,
            grab: self.scene.view().to_graph(position) - origin,
        });
        true
    }

    /// The node being dragged
    pub fn dragged_node(&self) -> Option<SceneKey> {
        self.node_drag.map(|drag| drag.node)
    }

    /// Pointer moved
    pub fn pointer_moved(&mut self, position: Pos2) -> GestureOutcome {
        if self.destroyed {
            return GestureOutcome::Ignored;
        }
        if let Some(drag) = self.node_drag {
            let target = self.scene.view().to_graph(position) - drag.grab;
            self.move_node(drag.node, target);
            return GestureOutcome::Ignored;
        }
        self.gesture.moved(&mut self.scene, position)
    }

    /// Pointer released over `element`, or over nothing
    pub fn pointer_released(&mut self, element: Option<ElementHandle>) -> GestureOutcome {
        if self.destroyed {
            return GestureOutcome::Ignored;
        }
        if let Some(drag) = self.node_drag.take() {
            tracing::trace!("Dropped node {}", drag.node);
            return GestureOutcome::Ignored;
        }
        let target = element.and_then(|element| self.scene.port_at(element));
        self.gesture.release(&mut self.scene, &mut self.links, target)
    }

    /// Tear everything down and detach from the surface
    ///
    /// Later events and frames are ignored. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.node_drag = None;
        self.gesture.cancel(&mut self.scene, CancelReason::Aborted);

        let nodes: Vec<_> = self
            .scene
            .node(self.node_layer)
            .map(|layer| layer.children().to_vec())
            .unwrap_or_default();
        for node in nodes {
            self.remove(node);
        }
        self.scene.remove(self.node_layer);
        self.scene.remove(self.links.edge_layer());
        self.scene.surface_mut().teardown();
        tracing::info!("Editor host destroyed");
    }

    /// Whether [`destroy`](Self::destroy) has run
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The scene
    pub fn scene(&self) -> &Scene<S> {
        &self.scene
    }

    /// Committed connections
    pub fn connectivity(&self) -> &Connectivity {
        &self.links
    }

    /// The edge gesture
    pub fn gesture(&self) -> &EdgeGesture {
        &self.gesture
    }

    /// The rendering backend
    pub fn surface(&self) -> &S {
        self.scene.surface()
    }

    /// The rendering backend, mutably
    pub fn surface_mut(&mut self) -> &mut S {
        self.scene.surface_mut()
    }

    /// Configuration the host was created with
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Layer holding graph nodes
    pub fn node_layer(&self) -> SceneKey {
        self.node_layer
    }

    /// Layer holding edges
    pub fn edge_layer(&self) -> SceneKey {
        self.links.edge_layer()
    }
}

impl<S: Surface> std::fmt::Debug for Host<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("scene", &self.scene)
            .field("connections", &self.links.len())
            .field("gesture", &self.gesture.state())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::GestureState;
    use crate::surface::{RetainedSurface, Visual};

    fn host() -> Host<RetainedSurface> {
        let config = EditorConfig::default();
        Host::new(RetainedSurface::new(config.layout.clone()), config).unwrap()
    }

    fn pass_through(id: &str, x: f32) -> GraphNode {
        GraphNode::new(id)
            .with_title(id.to_uppercase())
            .with_position(x, 0.0)
            .with_port(Port::input(format!("{id}.in"), "in", ["INT"]))
            .with_port(Port::output(format!("{id}.out"), "out", ["INT"]))
    }

    fn element(host: &Host<RetainedSurface>, id: &str) -> ElementHandle {
        host.get_node(id).unwrap().element().unwrap()
    }

    #[test]
    fn test_new_applies_initial_view() {
        let host = host();
        assert_eq!(host.view(), ViewTransform::new(400.0, 400.0, 2.0));
        assert_eq!(host.surface().view(), host.view());
        assert!(host.scene().node(host.node_layer()).unwrap().is_mounted());
        assert!(host.scene().node(host.edge_layer()).unwrap().is_mounted());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut host = host();
        let key = host.add(pass_through("a", 0.0)).unwrap();

        assert_eq!(host.graph_node("a").unwrap().title(), "A");
        assert_eq!(host.graph_node("a").unwrap().inputs().len(), 1);
        assert!(host.port("a.in").unwrap().is_input());
        assert_eq!(host.port("a.out").unwrap().owner(), Some(key));
        assert!(host.graph_node("a.in").is_none());
        assert!(host.port("a").is_none());
    }

    #[test]
    fn test_add_duplicate_keeps_first() {
        let mut host = host();
        let first = host.add(pass_through("a", 0.0)).unwrap();
        let len = host.scene().len();

        assert_eq!(
            host.add(GraphNode::new("a")),
            Err(SceneError::DuplicateId("a".into()))
        );
        assert_eq!(host.scene().lookup("a"), Some(first));
        assert_eq!(host.scene().len(), len);
    }

    #[test]
    fn test_frame_renders_nodes() {
        let mut host = host();
        host.add(pass_through("a", 10.0)).unwrap();
        let stats = host.frame();
        assert!(stats.updated >= 3);

        let visual = host.surface().element(element(&host, "a")).unwrap().visual.clone();
        assert!(matches!(
            visual,
            Some(Visual::Node { ref title, position, .. }) if title == "A" && position == Pos2::new(10.0, 0.0)
        ));
        assert_eq!(host.frame(), FrameStats::default());
    }

    #[test]
    fn test_removal_cascade() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        let b = host.add(pass_through("b", 250.0)).unwrap();
        let edge = host.connect("a.out", "b.in").unwrap();
        let edge_id = host.scene().node(edge).unwrap().id().to_string();

        assert!(host.remove(b));
        assert!(host.connectivity().is_empty());
        for id in ["b", "b.in", "b.out", edge_id.as_str()] {
            assert!(host.get_node(id).is_none(), "{id} still registered");
        }
        assert!(!host.remove(b));
    }

    #[test]
    fn test_removal_cascade_from_source_side() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.add(pass_through("c", 500.0)).unwrap();
        host.connect("a.out", "b.in").unwrap();
        host.connect("a.out", "c.in").unwrap();

        assert!(host.remove(a));
        assert!(host.connectivity().is_empty());
        // The freed inputs accept new connections
        assert!(host.connect("b.out", "c.in").is_ok());
    }

    #[test]
    fn test_remove_rejects_non_nodes() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        let port = host.scene().lookup("a.in").unwrap();
        assert!(!host.remove(port));
        assert!(!host.remove(host.node_layer()));
        assert!(host.port("a.in").is_some());
    }

    #[test]
    fn test_disconnect() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.connect("a.out", "b.in").unwrap();

        assert!(!host.disconnect("a.out"));
        assert!(host.disconnect("b.in"));
        assert!(!host.disconnect("b.in"));
        assert!(host.connectivity().is_empty());
    }

    #[test]
    fn test_move_node_updates_edge() {
        let mut host = host();
        host.set_view(ViewTransform::IDENTITY);
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.frame();
        let edge = host.connect("a.out", "b.in").unwrap();
        host.frame();

        assert!(host.move_node(a, Pos2::new(0.0, 100.0)));
        host.frame();
        let current = host.scene().node(edge).unwrap().as_edge().unwrap();
        assert_eq!(current.source_point(), Pos2::new(180.0, 135.0));
        assert_eq!(current.target_point(), Pos2::new(250.0, 35.0));
    }

    #[test]
    fn test_move_right_after_connect_settles_edge() {
        let mut host = host();
        host.set_view(ViewTransform::IDENTITY);
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.frame();

        let edge = host.connect("a.out", "b.in").unwrap();
        assert!(host.move_node(a, Pos2::new(0.0, 100.0)));
        host.frame();
        host.frame();

        let current = host.scene().node(edge).unwrap().as_edge().unwrap();
        assert_eq!(current.source_point(), Pos2::new(180.0, 135.0));
        assert_eq!(current.target_point(), Pos2::new(250.0, 35.0));
        assert_eq!(host.scene().queued(), 0);
    }

    #[test]
    fn test_node_mutators() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.frame();

        assert!(host.set_title(a, "renamed"));
        assert!(host.set_active(a, true));
        assert!(host.scene().node(a).unwrap().is_dirty());
        host.frame();

        let node = host.graph_node("a").unwrap();
        assert_eq!(node.title(), "renamed");
        assert!(node.is_active());
        let port = host.scene().lookup("a.in").unwrap();
        assert!(!host.set_title(port, "nope"));
    }

    #[test]
    fn test_focus_is_exclusive() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        let b = host.add(pass_through("b", 250.0)).unwrap();

        host.focus_node(Some(a));
        host.focus_node(Some(b));
        assert_eq!(host.focused(), Some(b));
        assert!(!host.graph_node("a").unwrap().has_focus());
        assert!(host.graph_node("b").unwrap().has_focus());

        host.remove(b);
        assert_eq!(host.focused(), None);
    }

    #[test]
    fn test_set_view_is_clamped() {
        let mut host = host();
        host.set_view(ViewTransform::new(0.0, 0.0, 10.0));
        assert_eq!(host.view().k, 2.0);
        host.set_view(ViewTransform::new(0.0, 0.0, 0.1));
        assert_eq!(host.view().k, 0.5);
    }

    #[test]
    fn test_pointer_gesture_connects() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.frame();

        let from = element(&host, "a.out");
        let to = element(&host, "b.in");
        assert_eq!(
            host.pointer(PointerEvent::PortPressed { element: from, position: Pos2::ZERO }),
            GestureOutcome::Started
        );
        assert_eq!(
            host.pointer(PointerEvent::Moved { position: Pos2::new(900.0, 480.0) }),
            GestureOutcome::Tracking
        );
        assert!(matches!(
            host.pointer(PointerEvent::Released { element: Some(to) }),
            GestureOutcome::Connected(_)
        ));
        assert_eq!(host.connectivity().len(), 1);
    }

    #[test]
    fn test_pointer_on_non_port_is_ignored() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        let body = element(&host, "a");
        assert_eq!(host.port_pressed(body, Pos2::ZERO), GestureOutcome::Ignored);
        assert_eq!(host.gesture().state(), GestureState::Idle);
        assert!(!host.node_pressed(element(&host, "a.in"), Pos2::ZERO));
        assert_eq!(host.dragged_node(), None);
    }

    #[test]
    fn test_node_drag_moves_in_graph_space() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.frame();
        let body = element(&host, "a");

        // The initial view is translated by (400, 400) and zoomed 2x
        assert_eq!(
            host.pointer(PointerEvent::NodePressed { element: body, position: Pos2::new(410.0, 410.0) }),
            GestureOutcome::Ignored
        );
        assert_eq!(host.focused(), Some(a));
        assert_eq!(host.dragged_node(), Some(a));

        host.pointer(PointerEvent::Moved { position: Pos2::new(510.0, 610.0) });
        assert_eq!(host.graph_node("a").unwrap().position(), Pos2::new(50.0, 100.0));
        assert_eq!(host.gesture().state(), GestureState::Idle);

        host.pointer(PointerEvent::Released { element: None });
        assert_eq!(host.dragged_node(), None);
        host.pointer(PointerEvent::Moved { position: Pos2::ZERO });
        assert_eq!(host.graph_node("a").unwrap().position(), Pos2::new(50.0, 100.0));
        assert_eq!(host.focused(), Some(a));
    }

    #[test]
    fn test_node_drag_and_edge_gesture_exclude_each_other() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.frame();

        assert!(host.node_pressed(element(&host, "a"), Pos2::ZERO));
        assert_eq!(host.port_pressed(element(&host, "b.out"), Pos2::ZERO), GestureOutcome::Ignored);
        assert!(!host.gesture().is_pending());
        host.pointer_released(None);

        assert_eq!(host.port_pressed(element(&host, "b.out"), Pos2::ZERO), GestureOutcome::Started);
        assert!(!host.node_pressed(element(&host, "a"), Pos2::ZERO));
        assert_eq!(host.dragged_node(), None);
    }

    #[test]
    fn test_removing_dragged_node_ends_drag() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.frame();
        assert!(host.node_pressed(element(&host, "a"), Pos2::ZERO));

        host.remove(a);
        assert_eq!(host.dragged_node(), None);
        assert_eq!(host.pointer_moved(Pos2::new(5.0, 5.0)), GestureOutcome::Ignored);
    }

    #[test]
    fn test_removing_anchor_node_cancels_gesture() {
        let mut host = host();
        let a = host.add(pass_through("a", 0.0)).unwrap();
        host.frame();
        host.port_pressed(element(&host, "a.out"), Pos2::ZERO);
        assert!(host.gesture().is_pending());

        host.remove(a);
        assert_eq!(host.gesture().state(), GestureState::Idle);
        assert!(host.scene().iter().all(|(_, node)| node.as_edge().is_none()));
    }

    #[test]
    fn test_destroy() {
        let mut host = host();
        host.add(pass_through("a", 0.0)).unwrap();
        host.add(pass_through("b", 250.0)).unwrap();
        host.connect("a.out", "b.in").unwrap();
        let port = element(&host, "a.out");

        host.destroy();
        assert!(host.is_destroyed());
        assert!(host.scene().is_empty());
        assert!(host.surface().is_empty());
        assert!(host.surface().is_torn_down());
        assert!(host.connectivity().is_empty());

        assert_eq!(host.frame(), FrameStats::default());
        assert_eq!(host.port_pressed(port, Pos2::ZERO), GestureOutcome::Ignored);
        assert!(host.add(GraphNode::new("c")).is_err());

        // Idempotent
        host.destroy();
    }
}
