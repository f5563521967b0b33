// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui front end for a [`Host`] backed by a [`RetainedSurface`].
//!
//! Each frame the canvas turns egui pointer input into host pointer
//! events (port presses start edges, node presses drag the node), lets the
//! host render whatever was marked, and paints the retained elements:
//! - edges first (below nodes), as bezier curves
//! - node bodies with header and title
//! - port handles and labels

use crate::gesture::GestureOutcome;
use crate::host::{Host, PointerEvent};
use crate::port::PortDirection;
use crate::surface::{ElementHandle, ElementKind, RetainedSurface, Surface, Visual};
use egui::{vec2, Color32, Pos2, Rect, Stroke, Vec2};

/// Node visual parameters
const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const PORT_PADDING: f32 = 12.0;

/// Maximum horizontal bend of an edge curve, in graph units
const BEZIER_CURVATURE: f32 = 50.0;
const BEZIER_SEGMENTS: usize = 32;

/// Pointer state sampled from egui for one frame, in canvas coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSample {
    /// Pointer position, if the pointer is over the canvas
    pub position: Option<Pos2>,
    /// Primary button went down this frame
    pub pressed: bool,
    /// Primary button went up this frame
    pub released: bool,
}

/// Interactive canvas state
#[derive(Debug, Default)]
pub struct GraphCanvas {
    hovered_port: Option<ElementHandle>,
    last_pointer: Pos2,
}

impl GraphCanvas {
    /// Create a new canvas
    pub fn new() -> Self {
        Self::default()
    }

    /// The port element under the pointer during the last frame
    pub fn hovered_port(&self) -> Option<ElementHandle> {
        self.hovered_port
    }

    /// Handle input, render the host and paint it into the available space
    ///
    /// Returns the gesture outcomes produced by this frame's input.
    pub fn show(&mut self, ui: &mut egui::Ui, host: &mut Host<RetainedSurface>) -> Vec<GestureOutcome> {
        let rect = ui.available_rect_before_wrap();
        let _response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let origin = rect.min.to_vec2();

        let sample = ui.input(|i| PointerSample {
            position: i
                .pointer
                .hover_pos()
                .filter(|pos| rect.contains(*pos))
                .map(|pos| pos - origin),
            pressed: i.pointer.primary_pressed(),
            released: i.pointer.primary_released(),
        });
        if let Some(position) = sample.position {
            self.last_pointer = position;
        }

        let events = pointer_events(host.surface(), sample, self.last_pointer);
        let outcomes: Vec<_> = events.into_iter().map(|event| host.pointer(event)).collect();
        host.frame();

        let surface = host.surface();
        self.hovered_port = sample.position.and_then(|pos| surface.port_at(pos));

        let stroke_width = host.config().edges.stroke_width;
        paint_edges(&painter, surface, origin, stroke_width);
        paint_nodes(&painter, surface, origin, self.hovered_port);

        // Painting reads elements directly; the op log only grows
        host.surface_mut().clear_ops();
        outcomes
    }
}

/// Translate one frame of pointer state into host events
///
/// Positions are canvas-relative screen coordinates, the space the surface
/// reports its bounds in. `last` stands in for the position when the
/// pointer has left the canvas.
pub fn pointer_events(surface: &RetainedSurface, sample: PointerSample, last: Pos2) -> Vec<PointerEvent> {
    let mut events = Vec::new();
    let position = sample.position.unwrap_or(last);

    if sample.pressed {
        if let Some(element) = surface.port_at(position) {
            events.push(PointerEvent::PortPressed { element, position });
        } else if let Some(element) = surface.node_at(position) {
            events.push(PointerEvent::NodePressed { element, position });
        }
    }
    if let Some(position) = sample.position {
        events.push(PointerEvent::Moved { position });
    }
    if sample.released {
        let element = sample.position.and_then(|pos| surface.port_at(pos));
        events.push(PointerEvent::Released { element });
    }
    events
}

/// Flatten an edge's control points into a polyline
///
/// The first and last lead-out segments stay straight; the span between
/// them is a cubic bezier bending along the lead-out direction. A
/// provisional edge (three points) curves straight into its free end.
pub fn edge_polyline(points: &[Pos2], segments: usize) -> Vec<Pos2> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    if points.len() < 3 {
        return points.to_vec();
    }

    let lead_out = points[1];
    let (lead_in, tail) = if points.len() >= 4 {
        (points[points.len() - 2], Some(last))
    } else {
        (last, None)
    };
    let sign = if lead_out.x >= first.x { 1.0 } else { -1.0 };
    let curvature = BEZIER_CURVATURE.min((lead_in.x - lead_out.x).abs() * 0.5);
    let bend = vec2(sign * curvature, 0.0);

    let mut polyline = vec![first];
    polyline.extend(bezier_points(
        lead_out,
        lead_out + bend,
        lead_in - bend,
        lead_in,
        segments,
    ));
    polyline.extend(tail);
    polyline
}

/// Generate points along a cubic bezier curve
fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

fn paint_edges(painter: &egui::Painter, surface: &RetainedSurface, origin: Vec2, stroke_width: f32) {
    let view = surface.view();
    for (_, element) in surface.elements() {
        let Some(Visual::Edge { points, connected, .. }) = &element.visual else {
            continue;
        };
        let polyline: Vec<Pos2> = edge_polyline(points, BEZIER_SEGMENTS)
            .into_iter()
            .map(|p| view.to_screen(p) + origin)
            .collect();
        let color = if *connected {
            Color32::from_gray(180)
        } else {
            Color32::from_rgba_unmultiplied(180, 180, 180, 120)
        };
        painter.add(egui::Shape::line(polyline, Stroke::new(stroke_width * view.k, color)));
    }
}

fn paint_nodes(
    painter: &egui::Painter,
    surface: &RetainedSurface,
    origin: Vec2,
    hovered: Option<ElementHandle>,
) {
    let zoom = surface.view().k;
    let port_radius = surface.layout().port_radius * zoom;
    for (handle, element) in surface.elements() {
        let Some(bounds) = surface.bounds(handle) else {
            continue;
        };
        let screen_rect = bounds.translate(origin);
        match (&element.kind, &element.visual) {
            (ElementKind::Node, Some(Visual::Node { title, active, focus, .. })) => {
                paint_node(painter, surface, screen_rect, title, *active, *focus, zoom);
            }
            (ElementKind::Port { direction, .. }, visual) => {
                let hovered = hovered == Some(handle);
                paint_port(painter, screen_rect, *direction, visual.as_ref(), hovered, port_radius, zoom);
            }
            _ => {}
        }
    }
}

fn paint_node(
    painter: &egui::Painter,
    surface: &RetainedSurface,
    screen_rect: Rect,
    title: &str,
    active: bool,
    focus: bool,
    zoom: f32,
) {
    let rounding = NODE_ROUNDING * zoom;

    // Shadow
    let shadow_rect = screen_rect.translate(Vec2::new(NODE_SHADOW_OFFSET, NODE_SHADOW_OFFSET));
    painter.rect_filled(shadow_rect, rounding, Color32::from_rgba_unmultiplied(0, 0, 0, 60));

    let bg_color = if focus {
        Color32::from_rgb(60, 70, 90)
    } else {
        Color32::from_rgb(45, 45, 48)
    };
    painter.rect_filled(screen_rect, rounding, bg_color);

    let header_rect = Rect::from_min_size(
        screen_rect.min,
        Vec2::new(screen_rect.width(), surface.layout().header_height * zoom),
    );
    let header_color = if active {
        Color32::from_rgb(70, 130, 100)
    } else {
        Color32::from_rgb(70, 100, 130)
    };
    painter.rect_filled(
        header_rect,
        egui::Rounding {
            nw: rounding,
            ne: rounding,
            sw: 0.0,
            se: 0.0,
        },
        header_color,
    );
    painter.text(
        header_rect.center(),
        egui::Align2::CENTER_CENTER,
        title,
        egui::FontId::proportional(12.0 * zoom),
        Color32::WHITE,
    );

    if focus {
        painter.rect_stroke(screen_rect, rounding, Stroke::new(2.0, Color32::from_rgb(100, 150, 255)));
    }
}

fn paint_port(
    painter: &egui::Painter,
    screen_rect: Rect,
    direction: PortDirection,
    visual: Option<&Visual>,
    hovered: bool,
    radius: f32,
    zoom: f32,
) {
    let anchor = direction.anchor(screen_rect);
    let color = Color32::from_rgb(150, 150, 170);

    if hovered {
        painter.circle_filled(anchor, radius * 1.3, color);
    } else {
        painter.circle_filled(anchor, radius, color);
    }
    painter.circle_stroke(anchor, radius, Stroke::new(1.0, Color32::from_gray(30)));

    let Some(Visual::Port { label, .. }) = visual else {
        return;
    };
    let (offset, align) = match direction {
        PortDirection::Input => (PORT_PADDING * zoom, egui::Align2::LEFT_CENTER),
        PortDirection::Output => (-PORT_PADDING * zoom, egui::Align2::RIGHT_CENTER),
    };
    painter.text(
        Pos2::new(anchor.x + offset, anchor.y),
        align,
        label,
        egui::FontId::proportional(10.0 * zoom),
        Color32::from_gray(200),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::graph_node::GraphNode;
    use crate::port::Port;
    use crate::view::ViewTransform;

    fn host() -> Host<RetainedSurface> {
        let config = EditorConfig::default();
        let mut host = Host::new(RetainedSurface::new(config.layout.clone()), config).unwrap();
        host.set_view(ViewTransform::IDENTITY);
        host.add(GraphNode::new("a").with_port(Port::output("a.out", "out", ["INT"])))
            .unwrap();
        host.add(
            GraphNode::new("b")
                .with_position(300.0, 0.0)
                .with_port(Port::input("b.in", "in", ["INT"])),
        )
        .unwrap();
        host.frame();
        host
    }

    #[test]
    fn test_bezier_endpoints() {
        let points = bezier_points(Pos2::ZERO, Pos2::new(1.0, 0.0), Pos2::new(2.0, 1.0), Pos2::new(3.0, 1.0), 8);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], Pos2::ZERO);
        assert_eq!(points[8], Pos2::new(3.0, 1.0));
    }

    #[test]
    fn test_connected_polyline_keeps_leads() {
        let points = [
            Pos2::new(0.0, 0.0),
            Pos2::new(5.0, 0.0),
            Pos2::new(95.0, 40.0),
            Pos2::new(100.0, 40.0),
        ];
        let line = edge_polyline(&points, 4);
        assert_eq!(line.len(), 7);
        assert_eq!(line[0], points[0]);
        assert_eq!(line[1], points[1]);
        assert_eq!(line[5], points[2]);
        assert_eq!(line[6], points[3]);
    }

    #[test]
    fn test_provisional_polyline_ends_at_pointer() {
        let points = [Pos2::new(0.0, 0.0), Pos2::new(-5.0, 0.0), Pos2::new(-80.0, 30.0)];
        let line = edge_polyline(&points, 4);
        assert_eq!(line.len(), 6);
        assert_eq!(line.last(), Some(&Pos2::new(-80.0, 30.0)));
    }

    #[test]
    fn test_short_polylines_pass_through() {
        assert!(edge_polyline(&[], 4).is_empty());
        let two = [Pos2::ZERO, Pos2::new(1.0, 1.0)];
        assert_eq!(edge_polyline(&two, 4), two.to_vec());
    }

    #[test]
    fn test_press_on_port_emits_port_pressed() {
        let host = host();
        let port = host.get_node("a.out").unwrap().element().unwrap();
        let sample = PointerSample {
            position: Some(Pos2::new(179.0, 35.0)),
            pressed: true,
            released: false,
        };

        let events = pointer_events(host.surface(), sample, Pos2::ZERO);
        assert_eq!(
            events,
            vec![
                PointerEvent::PortPressed { element: port, position: Pos2::new(179.0, 35.0) },
                PointerEvent::Moved { position: Pos2::new(179.0, 35.0) },
            ]
        );
    }

    #[test]
    fn test_press_on_empty_space_only_moves() {
        let host = host();
        let sample = PointerSample {
            position: Some(Pos2::new(600.0, 600.0)),
            pressed: true,
            released: false,
        };
        let events = pointer_events(host.surface(), sample, Pos2::ZERO);
        assert_eq!(events, vec![PointerEvent::Moved { position: Pos2::new(600.0, 600.0) }]);
    }

    #[test]
    fn test_press_on_node_header_emits_node_pressed() {
        let host = host();
        let body = host.get_node("a").unwrap().element().unwrap();
        let sample = PointerSample {
            position: Some(Pos2::new(90.0, 10.0)),
            pressed: true,
            released: false,
        };
        let events = pointer_events(host.surface(), sample, Pos2::ZERO);
        assert_eq!(
            events,
            vec![
                PointerEvent::NodePressed { element: body, position: Pos2::new(90.0, 10.0) },
                PointerEvent::Moved { position: Pos2::new(90.0, 10.0) },
            ]
        );
    }

    #[test]
    fn test_drag_node_header() {
        let mut host = host();
        let a = host.scene().lookup("a").unwrap();
        let frames = [
            PointerSample { position: Some(Pos2::new(90.0, 10.0)), pressed: true, released: false },
            PointerSample { position: Some(Pos2::new(130.0, 70.0)), pressed: false, released: false },
            PointerSample { position: Some(Pos2::new(130.0, 70.0)), pressed: false, released: true },
        ];
        for sample in frames {
            for event in pointer_events(host.surface(), sample, Pos2::ZERO) {
                host.pointer(event);
            }
            host.frame();
        }

        assert_eq!(host.graph_node("a").unwrap().position(), Pos2::new(40.0, 60.0));
        assert_eq!(host.focused(), Some(a));
        assert_eq!(host.dragged_node(), None);
        assert!(host.connectivity().is_empty());
        assert_eq!(host.surface().node_at(Pos2::new(130.0, 70.0)), host.get_node("a").unwrap().element());
    }

    #[test]
    fn test_release_outside_canvas_has_no_target() {
        let host = host();
        let sample = PointerSample {
            position: None,
            pressed: false,
            released: true,
        };
        let events = pointer_events(host.surface(), sample, Pos2::new(301.0, 35.0));
        assert_eq!(events, vec![PointerEvent::Released { element: None }]);
    }

    #[test]
    fn test_drag_between_ports() {
        let mut host = host();
        let press = PointerSample {
            position: Some(Pos2::new(180.0, 35.0)),
            pressed: true,
            released: false,
        };
        let release = PointerSample {
            position: Some(Pos2::new(301.0, 35.0)),
            pressed: false,
            released: true,
        };

        for sample in [press, release] {
            for event in pointer_events(host.surface(), sample, Pos2::ZERO) {
                host.pointer(event);
            }
        }
        assert_eq!(host.connectivity().len(), 1);
    }
}
