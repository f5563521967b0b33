// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pan/zoom view transform.

use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};

/// Translation `(x, y)` in screen pixels followed by uniform scale `k`.
///
/// Graph space is what nodes and edges are positioned in; screen space is
/// what pointer events and surface bounds are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Horizontal translation
    pub x: f32,
    /// Vertical translation
    pub y: f32,
    /// Zoom factor
    pub k: f32,
}

impl ViewTransform {
    /// The identity transform
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, k: 1.0 };

    /// Create a new transform
    pub fn new(x: f32, y: f32, k: f32) -> Self {
        Self { x, y, k }
    }

    /// Convert a screen position to graph space
    pub fn to_graph(&self, screen: Pos2) -> Pos2 {
        Pos2::new((screen.x - self.x) / self.k, (screen.y - self.y) / self.k)
    }

    /// Convert a graph position to screen space
    pub fn to_screen(&self, graph: Pos2) -> Pos2 {
        Pos2::new(graph.x * self.k + self.x, graph.y * self.k + self.y)
    }

    /// Convert a graph-space rectangle to screen space
    pub fn rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(rect.min), self.to_screen(rect.max))
    }

    /// Clamp the zoom factor into `[min, max]`
    pub fn clamped(mut self, min: f32, max: f32) -> Self {
        self.k = self.k.clamp(min, max);
        self
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
