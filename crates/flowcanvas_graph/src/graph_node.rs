// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the editor surface.

use crate::port::{Port, PortDirection};
use crate::scene::SceneKey;
use egui::Pos2;
use uuid::Uuid;

/// A pure container with no visual update of its own
///
/// The host keeps one per layer (edges below, nodes above).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    id: String,
}

impl GroupNode {
    /// Create a group with a generated id
    pub fn new() -> Self {
        Self {
            id: format!("group-{}", Uuid::new_v4()),
        }
    }

    /// Group id
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for GroupNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A user-placed node with a title, a position and typed ports
///
/// Ports are declared up front with [`with_port`](Self::with_port) and
/// become scene children when the node is added to a
/// [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    id: String,
    title: String,
    position: Pos2,
    active: bool,
    focus: bool,
    /// Ports waiting to be mounted
    pending: Vec<Port>,
    inputs: Vec<SceneKey>,
    outputs: Vec<SceneKey>,
}

impl GraphNode {
    /// Create a new node
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: "Untitled".to_string(),
            position: Pos2::ZERO,
            active: false,
            focus: false,
            pending: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Pos2::new(x, y);
        self
    }

    /// Set the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Declare a port, keeping its own direction
    pub fn with_port(mut self, port: Port) -> Self {
        self.pending.push(port);
        self
    }

    /// Declare an input port
    pub fn with_input(mut self, mut port: Port) -> Self {
        port.set_direction(PortDirection::Input);
        self.pending.push(port);
        self
    }

    /// Declare an output port
    pub fn with_output(mut self, mut port: Port) -> Self {
        port.set_direction(PortDirection::Output);
        self.pending.push(port);
        self
    }

    /// Node id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Title text
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Position in graph space
    pub fn position(&self) -> Pos2 {
        self.position
    }

    /// Whether the node is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the node has focus
    pub fn has_focus(&self) -> bool {
        self.focus
    }

    /// Mounted input ports, in declaration order
    pub fn inputs(&self) -> &[SceneKey] {
        &self.inputs
    }

    /// Mounted output ports, in declaration order
    pub fn outputs(&self) -> &[SceneKey] {
        &self.outputs
    }

    /// All mounted ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = SceneKey> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub(crate) fn set_position(&mut self, position: Pos2) {
        self.position = position;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_focus(&mut self, focus: bool) {
        self.focus = focus;
    }

    /// Take the declared ports, numbering them per direction
    pub(crate) fn take_pending(&mut self) -> Vec<Port> {
        let mut inputs = 0;
        let mut outputs = 0;
        let mut ports = std::mem::take(&mut self.pending);
        for port in &mut ports {
            let counter = match port.direction() {
                PortDirection::Input => &mut inputs,
                PortDirection::Output => &mut outputs,
            };
            port.set_index(*counter);
            *counter += 1;
        }
        ports
    }

    pub(crate) fn push_port(&mut self, direction: PortDirection, key: SceneKey) {
        match direction {
            PortDirection::Input => self.inputs.push(key),
            PortDirection::Output => self.outputs.push(key),
        }
    }
}
