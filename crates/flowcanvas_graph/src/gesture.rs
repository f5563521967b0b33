// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer driven edge creation.
//!
//! Pressing a port starts a provisional edge whose free end follows the
//! pointer. Releasing over a compatible port commits it through
//! [`Connectivity::connect`]; anything else discards it. Pressing an input
//! that is already connected unplugs that connection and continues the
//! drag from its output.

use crate::connectivity::{ConnectError, Connectivity};
use crate::edge::Edge;
use crate::scene::{Entity, Scene, SceneKey};
use crate::surface::Surface;
use egui::Pos2;

/// Gesture state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureState {
    /// No edge is being dragged
    #[default]
    Idle,
    /// A provisional edge is being dragged
    Pending {
        /// The provisional edge
        edge: SceneKey,
        /// The port its bound end is attached to
        anchor: SceneKey,
    },
}

/// Why a gesture ended without a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Released away from any port
    NoTarget,
    /// Released on a port of the same direction as the anchor
    SameDirection,
    /// The anchor's node went away mid-drag
    AnchorRemoved,
    /// Cancelled by the host
    Aborted,
}

/// Result of feeding one pointer event to the gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    /// A provisional edge was created
    Started,
    /// The free end moved
    Tracking,
    /// The provisional edge was discarded
    Cancelled(CancelReason),
    /// A connection was committed
    Connected(SceneKey),
    /// The drop was refused by the connectivity checks
    Rejected(ConnectError),
    /// The event does not apply in the current state
    Ignored,
}

/// Edge creation state machine
#[derive(Debug, Clone, Default)]
pub struct EdgeGesture {
    state: GestureState,
}

impl EdgeGesture {
    /// Create an idle gesture
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Whether an edge is being dragged
    pub fn is_pending(&self) -> bool {
        matches!(self.state, GestureState::Pending { .. })
    }

    /// The anchor port while pending
    pub fn anchor(&self) -> Option<SceneKey> {
        match self.state {
            GestureState::Pending { anchor, .. } => Some(anchor),
            GestureState::Idle => None,
        }
    }

    /// Pointer pressed on `port` at screen position `position`
    pub fn press<S: Surface>(
        &mut self,
        scene: &mut Scene<S>,
        links: &mut Connectivity,
        port: SceneKey,
        position: Pos2,
    ) -> GestureOutcome {
        if self.is_pending() {
            return GestureOutcome::Ignored;
        }
        let Some(pressed) = scene.node(port).and_then(|node| node.as_port()) else {
            return GestureOutcome::Ignored;
        };

        let mut anchor = port;
        if pressed.is_input() {
            if let Some(link) = links.link_for_input(port) {
                tracing::debug!("Unplugging {} from {}", link.edge, port);
                links.remove_link(scene, link.edge);
                anchor = link.source;
            }
        }

        let edge = scene.insert(Entity::Edge(Edge::provisional(anchor)));
        if let Err(err) = scene.add_child(links.edge_layer(), None, edge) {
            scene.remove(edge);
            tracing::warn!("Failed to start edge: {}", err);
            return GestureOutcome::Rejected(err.into());
        }

        let start = scene
            .anchor(anchor)
            .unwrap_or_else(|| scene.view().to_graph(position));
        if let Some(provisional) = scene.edge_mut(edge) {
            provisional.to = start;
        }
        scene.mark(edge);

        self.state = GestureState::Pending { edge, anchor };
        GestureOutcome::Started
    }

    /// Pointer moved to screen position `position`
    pub fn moved<S: Surface>(&mut self, scene: &mut Scene<S>, position: Pos2) -> GestureOutcome {
        let GestureState::Pending { edge, .. } = self.state else {
            return GestureOutcome::Ignored;
        };
        let point = scene.view().to_graph(position);
        if let Some(provisional) = scene.edge_mut(edge) {
            provisional.to = point;
        }
        scene.mark(edge);
        GestureOutcome::Tracking
    }

    /// Pointer released over `target`, or over no port
    pub fn release<S: Surface>(
        &mut self,
        scene: &mut Scene<S>,
        links: &mut Connectivity,
        target: Option<SceneKey>,
    ) -> GestureOutcome {
        let GestureState::Pending { edge, anchor } = std::mem::take(&mut self.state) else {
            return GestureOutcome::Ignored;
        };
        scene.remove(edge);

        let Some((target, target_port)) =
            target.and_then(|key| Some((key, scene.node(key)?.as_port()?)))
        else {
            return GestureOutcome::Cancelled(CancelReason::NoTarget);
        };
        let Some(anchor_port) = scene.node(anchor).and_then(|node| node.as_port()) else {
            return GestureOutcome::Cancelled(CancelReason::AnchorRemoved);
        };
        if anchor_port.direction() == target_port.direction() {
            return GestureOutcome::Cancelled(CancelReason::SameDirection);
        }

        let anchor_id = anchor_port.id().to_string();
        let target_id = target_port.id().to_string();
        let mut replaced = None;
        if target_port.is_input() {
            if let Some(link) = links.link_for_input(target) {
                replaced = scene
                    .node(link.source)
                    .map(|node| node.id().to_string());
                links.remove_link(scene, link.edge);
            }
        }

        match links.connect(scene, &anchor_id, &target_id) {
            Ok(edge) => GestureOutcome::Connected(edge),
            Err(err) => {
                if let Some(source_id) = replaced {
                    if let Err(restore) = links.connect(scene, &source_id, &target_id) {
                        tracing::warn!("Could not restore {:?} -> {:?}: {}", source_id, target_id, restore);
                    }
                }
                tracing::warn!("Dropped edge rejected: {}", err);
                GestureOutcome::Rejected(err)
            }
        }
    }

    /// Discard the provisional edge, if any
    pub fn cancel<S: Surface>(&mut self, scene: &mut Scene<S>, reason: CancelReason) -> GestureOutcome {
        let GestureState::Pending { edge, .. } = std::mem::take(&mut self.state) else {
            return GestureOutcome::Ignored;
        };
        scene.remove(edge);
        tracing::debug!("Edge gesture cancelled: {:?}", reason);
        GestureOutcome::Cancelled(reason)
    }
}
