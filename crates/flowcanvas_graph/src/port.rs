// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::scene::SceneKey;
use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// Point on a port's bounds where edges attach
    ///
    /// Inputs attach on their left edge, outputs on their right edge.
    pub fn anchor(self, bounds: Rect) -> Pos2 {
        match self {
            Self::Input => bounds.left_center(),
            Self::Output => bounds.right_center(),
        }
    }

    /// Sign of the horizontal lead-out for an edge leaving this port
    pub fn lead(self) -> f32 {
        match self {
            Self::Input => -1.0,
            Self::Output => 1.0,
        }
    }
}

/// A typed attachment point on a [`GraphNode`](crate::GraphNode)
///
/// The accepted data types are ordered: the first one is the primary type,
/// which is what an output offers to the inputs it is connected to.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    id: String,
    label: String,
    direction: PortDirection,
    data_types: Vec<String>,
    index: usize,
    owner: Option<SceneKey>,
}

impl Port {
    /// Create a new port
    pub fn new<I, T>(
        id: impl Into<String>,
        label: impl Into<String>,
        direction: PortDirection,
        data_types: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            label: label.into(),
            direction,
            data_types: data_types.into_iter().map(Into::into).collect(),
            index: 0,
            owner: None,
        }
    }

    /// Create a new input port
    pub fn input<I, T>(id: impl Into<String>, label: impl Into<String>, data_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(id, label, PortDirection::Input, data_types)
    }

    /// Create a new output port
    pub fn output<I, T>(id: impl Into<String>, label: impl Into<String>, data_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(id, label, PortDirection::Output, data_types)
    }

    /// Port id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Whether this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Accepted data types, primary first
    pub fn data_types(&self) -> &[String] {
        &self.data_types
    }

    /// The primary data type, if any type is declared
    pub fn primary_type(&self) -> Option<&str> {
        self.data_types.first().map(String::as_str)
    }

    /// Whether this port accepts values of `data_type`
    pub fn accepts(&self, data_type: &str) -> bool {
        self.data_types.iter().any(|t| t == data_type)
    }

    /// Position of this port among its node's ports of the same direction
    pub fn index(&self) -> usize {
        self.index
    }

    /// The owning node, once mounted
    pub fn owner(&self) -> Option<SceneKey> {
        self.owner
    }

    pub(crate) fn set_direction(&mut self, direction: PortDirection) {
        self.direction = direction;
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<SceneKey>) {
        self.owner = owner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_type() {
        let port = Port::input("p", "a", ["INT", "BOOL"]);
        assert_eq!(port.primary_type(), Some("INT"));
        assert!(port.accepts("BOOL"));
        assert!(!port.accepts("STRING"));
        assert!(port.is_input());
    }

    #[test]
    fn test_untyped_port() {
        let port = Port::output("p", "any", Vec::<String>::new());
        assert_eq!(port.primary_type(), None);
        assert!(!port.accepts(""));
    }

    #[test]
    fn test_anchor_side() {
        let bounds = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(10.0, 20.0));
        assert_eq!(PortDirection::Input.anchor(bounds), Pos2::new(0.0, 10.0));
        assert_eq!(PortDirection::Output.anchor(bounds), Pos2::new(10.0, 10.0));
    }
}
