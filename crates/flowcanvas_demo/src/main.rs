// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless `FlowCanvas` session.
//!
//! Builds a three node graph, connects ports directly and through a
//! replayed pointer gesture, then logs what the editor ended up with.
//!
//! Usage: `flowcanvas_demo [config.ron]`

use egui::Pos2;
use flowcanvas_graph::{
    EditorConfig, ElementHandle, GraphNode, Host, PointerEvent, Port, RetainedSurface,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error>;

fn main() {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::new("info,flowcanvas_graph=debug"),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FlowCanvas demo v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => EditorConfig::load(&path)?,
        None => EditorConfig::default(),
    };
    let mut host = Host::new(RetainedSurface::new(config.layout.clone()), config)?;

    let absolute = host.add(
        GraphNode::new("1")
            .with_title("absolute")
            .with_input(Port::input("n1-i-1", "a", ["INT", "BOOL"]))
            .with_input(Port::input("n1-i-2", "b", ["INT", "BOOL"]))
            .with_output(Port::output("n1-o-1", "sum", ["INT"])),
    )?;
    host.add(
        GraphNode::new("2")
            .with_position(0.0, 200.0)
            .with_input(Port::input("n2-i-1", "a", ["INT", "BOOL"]))
            .with_input(Port::input("n2-i-2", "b", ["INT", "BOOL"]))
            .with_output(Port::output("n2-o-1", "sum", ["BOOL"])),
    )?;
    host.add(
        GraphNode::new("3")
            .with_position(400.0, 100.0)
            .with_input(Port::input("n3-i-1", "a", ["INT", "BOOL"]))
            .with_input(Port::input("n3-i-2", "b", ["INT"]))
            .with_output(Port::output("n3-o-1", "sum", ["INT"])),
    )?;
    host.set_active(absolute, true);
    let stats = host.frame();
    tracing::info!("First frame: {} queued, {} updated", stats.queued, stats.updated);

    host.connect("n2-o-1", "n1-i-1")?;
    if let Err(e) = host.connect("n3-o-1", "n1-i-1") {
        tracing::info!("Second connection into n1-i-1 refused as expected: {e}");
    }
    host.frame();

    // Drag n3's output onto n2's second input
    let outcome = drag(&mut host, "n3-o-1", "n2-i-2")?;
    tracing::info!("Gesture n3-o-1 -> n2-i-2: {outcome:?}");

    // Closing the loop 1 -> 3 -> 2 -> 1 is rejected and leaves the graph alone
    let outcome = drag(&mut host, "n1-o-1", "n3-i-2")?;
    tracing::info!("Gesture n1-o-1 -> n3-i-2: {outcome:?}");

    for (input, link) in host.connectivity().links() {
        let name = |key| host.scene().node(key).map_or("?", |node| node.id());
        tracing::info!("{} -> {}", name(link.source), name(input));
    }

    host.destroy();
    Ok(())
}

/// Replay press, move and release between two ports
fn drag(
    host: &mut Host<RetainedSurface>,
    from: &str,
    to: &str,
) -> Result<flowcanvas_graph::GestureOutcome, BoxError> {
    let from = element(host, from)?;
    let to = element(host, to)?;
    let start = bounds_center(host, from)?;
    let end = bounds_center(host, to)?;

    host.pointer(PointerEvent::PortPressed { element: from, position: start });
    host.frame();
    host.pointer(PointerEvent::Moved { position: start.lerp(end, 0.5) });
    host.frame();
    host.pointer(PointerEvent::Moved { position: end });
    let outcome = host.pointer(PointerEvent::Released { element: Some(to) });
    host.frame();
    Ok(outcome)
}

fn element(host: &Host<RetainedSurface>, id: &str) -> Result<ElementHandle, BoxError> {
    host.get_node(id)
        .and_then(|node| node.element())
        .ok_or_else(|| format!("no element for {id:?}").into())
}

fn bounds_center(host: &Host<RetainedSurface>, element: ElementHandle) -> Result<Pos2, BoxError> {
    use flowcanvas_graph::Surface;

    host.surface()
        .bounds(element)
        .map(|rect| rect.center())
        .ok_or_else(|| format!("element {element:?} has no layout").into())
}
