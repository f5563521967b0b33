// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge (connection) definitions.

use crate::port::PortDirection;
use crate::scene::SceneKey;
use egui::{vec2, Pos2};
use uuid::Uuid;

/// A directed connection from a source port to a target port
///
/// While a gesture is in flight the edge has no target and its second
/// endpoint follows the pointer. Endpoint coordinates are in graph space.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    id: String,
    source: SceneKey,
    target: Option<SceneKey>,
    /// Source endpoint
    pub(crate) from: Pos2,
    /// Target endpoint, or the free pointer position
    pub(crate) to: Pos2,
    connected: bool,
}

impl Edge {
    /// Create an edge between two ports
    pub fn new(source: SceneKey, target: SceneKey) -> Self {
        Self {
            id: format!("edge-{}", Uuid::new_v4()),
            source,
            target: Some(target),
            from: Pos2::ZERO,
            to: Pos2::ZERO,
            connected: true,
        }
    }

    /// Create a provisional edge anchored at `source`
    pub fn provisional(source: SceneKey) -> Self {
        Self {
            target: None,
            connected: false,
            ..Self::new(source, source)
        }
    }

    /// Edge id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source port
    pub fn source(&self) -> SceneKey {
        self.source
    }

    /// Target port, absent while provisional
    pub fn target(&self) -> Option<SceneKey> {
        self.target
    }

    /// Whether both endpoints are bound
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Source endpoint in graph space
    pub fn source_point(&self) -> Pos2 {
        self.from
    }

    /// Target endpoint in graph space
    pub fn target_point(&self) -> Pos2 {
        self.to
    }

    /// Whether the edge touches `port` at either end
    pub fn touches(&self, port: SceneKey) -> bool {
        self.source == port || self.target == Some(port)
    }

    /// Control points of the edge path
    ///
    /// Each bound endpoint gets a short horizontal lead-out of `tangent`
    /// units, away from the node on the side of its port.
    pub fn path(&self, source_direction: PortDirection, tangent: f32) -> Vec<Pos2> {
        let lead = vec2(source_direction.lead() * tangent, 0.0);
        let mut points = vec![self.from, self.from + lead];
        if self.connected {
            points.push(self.to - lead);
        }
        points.push(self.to);
        points
    }
}
