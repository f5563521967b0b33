// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rendering backend boundary.
//!
//! The scene never draws anything itself. Each mounted scene node owns one
//! backend element, created through [`Surface::create`] and refreshed with
//! a [`Visual`] whenever the node renders.
//!
//! [`RetainedSurface`] keeps every element in memory with a deterministic
//! layout. It backs the egui adapter in [`crate::ui`] and is what the tests
//! render into.

use crate::config::LayoutConfig;
use crate::port::PortDirection;
use crate::view::ViewTransform;
use egui::{vec2, Pos2, Rect};
use indexmap::IndexMap;

/// Opaque handle to a backend element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

/// What kind of element a scene node asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Layer container
    Layer,
    /// Graph node body
    Node,
    /// Port row inside a node
    Port {
        /// Port direction
        direction: PortDirection,
        /// Row among ports of the same direction
        index: usize,
    },
    /// Edge path
    Edge,
}

/// Display state pushed to an element on render
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    /// Graph node body
    Node {
        /// Title text
        title: String,
        /// Top-left corner in graph space
        position: Pos2,
        /// Active flag
        active: bool,
        /// Focus flag
        focus: bool,
    },
    /// Port row
    Port {
        /// Label text
        label: String,
        /// Accepted data types, primary first
        data_types: Vec<String>,
    },
    /// Edge path
    Edge {
        /// Control points in graph space
        points: Vec<Pos2>,
        /// Whether both endpoints are bound
        connected: bool,
        /// Data types of the source port
        data_types: Vec<String>,
    },
}

/// A rendering backend
pub trait Surface {
    /// Create an element under `parent` (the root when `None`)
    fn create(&mut self, parent: Option<ElementHandle>, kind: ElementKind) -> ElementHandle;

    /// Push new display state to an element
    fn update(&mut self, element: ElementHandle, visual: &Visual);

    /// Remove an element and everything below it
    fn remove(&mut self, element: ElementHandle);

    /// Screen-space bounds of an element, if it has a layout
    fn bounds(&self, element: ElementHandle) -> Option<Rect>;

    /// Apply a new pan/zoom transform to the layers
    fn set_view(&mut self, view: ViewTransform);

    /// Detach the surface from its host container
    fn teardown(&mut self);
}

/// A retained element
#[derive(Debug, Clone)]
pub struct Element {
    /// Parent element
    pub parent: Option<ElementHandle>,
    /// Element kind
    pub kind: ElementKind,
    /// Last pushed display state
    pub visual: Option<Visual>,
    /// Child elements in creation order
    pub children: Vec<ElementHandle>,
}

/// Operations recorded by [`RetainedSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    /// Element created
    Created(ElementHandle, ElementKind),
    /// Element updated
    Updated(ElementHandle),
    /// Element removed
    Removed(ElementHandle),
    /// View changed
    View(ViewTransform),
    /// Surface torn down
    TornDown,
}

/// In-memory surface with a fixed node layout
#[derive(Debug, Clone)]
pub struct RetainedSurface {
    elements: IndexMap<ElementHandle, Element>,
    layout: LayoutConfig,
    view: ViewTransform,
    next_handle: u64,
    ops: Vec<SurfaceOp>,
    torn_down: bool,
}

impl RetainedSurface {
    /// Create an empty surface
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            elements: IndexMap::new(),
            layout,
            view: ViewTransform::IDENTITY,
            next_handle: 1,
            ops: Vec::new(),
            torn_down: false,
        }
    }

    /// Layout metrics
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Current view transform
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Look up an element
    pub fn element(&self, handle: ElementHandle) -> Option<&Element> {
        self.elements.get(&handle)
    }

    /// All live elements in creation order
    pub fn elements(&self) -> impl Iterator<Item = (ElementHandle, &Element)> {
        self.elements.iter().map(|(h, e)| (*h, e))
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no element is live
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Recorded operations
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// How many times an element has been updated
    pub fn update_count(&self, handle: ElementHandle) -> usize {
        self.ops
            .iter()
            .filter(|op| **op == SurfaceOp::Updated(handle))
            .count()
    }

    /// Whether [`Surface::teardown`] has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Graph-space rectangle of a node or port element
    pub fn layout_rect(&self, handle: ElementHandle) -> Option<Rect> {
        let element = self.elements.get(&handle)?;
        match element.kind {
            ElementKind::Node => {
                let Some(Visual::Node { position, .. }) = &element.visual else {
                    return None;
                };
                let rows = self.port_rows(element);
                let height = self.layout.header_height + rows as f32 * self.layout.port_height + 8.0;
                Some(Rect::from_min_size(*position, vec2(self.layout.node_width, height)))
            }
            ElementKind::Port { direction, index } => {
                let node = self.layout_rect(element.parent?)?;
                let half = self.layout.node_width / 2.0;
                let top = node.top() + self.layout.header_height + index as f32 * self.layout.port_height;
                let left = match direction {
                    PortDirection::Input => node.left(),
                    PortDirection::Output => node.left() + half,
                };
                Some(Rect::from_min_size(
                    Pos2::new(left, top),
                    vec2(half, self.layout.port_height),
                ))
            }
            ElementKind::Layer | ElementKind::Edge => None,
        }
    }

    /// Topmost port element under a screen position
    pub fn port_at(&self, screen: Pos2) -> Option<ElementHandle> {
        let reach = self.layout.port_radius * 1.5 * self.view.k;
        self.elements
            .iter()
            .rev()
            .filter_map(|(handle, element)| match element.kind {
                ElementKind::Port { direction, .. } => Some((*handle, direction)),
                _ => None,
            })
            .find(|(handle, direction)| {
                self.bounds(*handle).is_some_and(|rect| {
                    rect.contains(screen) || direction.anchor(rect).distance(screen) < reach
                })
            })
            .map(|(handle, _)| handle)
    }

    /// Topmost node element under a screen position
    pub fn node_at(&self, screen: Pos2) -> Option<ElementHandle> {
        self.elements
            .iter()
            .rev()
            .filter(|(_, element)| element.kind == ElementKind::Node)
            .map(|(handle, _)| *handle)
            .find(|handle| self.bounds(*handle).is_some_and(|rect| rect.contains(screen)))
    }

    fn port_rows(&self, node: &Element) -> usize {
        let (mut inputs, mut outputs) = (0, 0);
        for child in &node.children {
            if let Some(ElementKind::Port { direction, .. }) = self.elements.get(child).map(|e| e.kind) {
                match direction {
                    PortDirection::Input => inputs += 1,
                    PortDirection::Output => outputs += 1,
                }
            }
        }
        inputs.max(outputs)
    }
}

impl Default for RetainedSurface {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl Surface for RetainedSurface {
    fn create(&mut self, parent: Option<ElementHandle>, kind: ElementKind) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;

        let parent = parent.filter(|p| self.elements.contains_key(p));
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.push(handle);
        }
        self.elements.insert(
            handle,
            Element {
                parent,
                kind,
                visual: None,
                children: Vec::new(),
            },
        );
        self.ops.push(SurfaceOp::Created(handle, kind));
        handle
    }

    fn update(&mut self, element: ElementHandle, visual: &Visual) {
        if let Some(entry) = self.elements.get_mut(&element) {
            entry.visual = Some(visual.clone());
            self.ops.push(SurfaceOp::Updated(element));
        }
    }

    fn remove(&mut self, element: ElementHandle) {
        let Some(entry) = self.elements.shift_remove(&element) else {
            return;
        };
        if let Some(parent) = entry.parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != element);
        }
        for child in entry.children {
            self.remove(child);
        }
        self.ops.push(SurfaceOp::Removed(element));
    }

    fn bounds(&self, element: ElementHandle) -> Option<Rect> {
        self.layout_rect(element)
            .map(|rect| self.view.rect_to_screen(rect))
    }

    fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
        self.ops.push(SurfaceOp::View(view));
    }

    fn teardown(&mut self) {
        let roots: Vec<_> = self
            .elements
            .iter()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(h, _)| *h)
            .collect();
        for root in roots {
            self.remove(root);
        }
        self.torn_down = true;
        self.ops.push(SurfaceOp::TornDown);
    }
}
