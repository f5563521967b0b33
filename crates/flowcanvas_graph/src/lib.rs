// SPDX-License-Identifier: MIT OR Apache-2.0
//! Embeddable node graph editor surface for `FlowCanvas`.
//!
//! Users place nodes with typed input/output ports and drag directed
//! connections between them. The crate is backend agnostic: everything
//! visual goes through the [`Surface`] trait, and [`ui`] provides an egui
//! adapter on top of the retained [`RetainedSurface`].
//!
//! ## Architecture
//!
//! - [`scene`] - ownership tree, invalidation links, render queue
//! - [`connectivity`] - typed, single-inbound, acyclic connections
//! - [`cycle`] - cycle detection over the node-projected graph
//! - [`gesture`] - pointer driven edge creation
//! - [`host`] - the public coordinator tying the above together
//!
//! ```ignore
//! use flowcanvas_graph::{EditorConfig, GraphNode, Host, Port, RetainedSurface};
//!
//! let config = EditorConfig::default();
//! let mut host = Host::new(RetainedSurface::new(config.layout.clone()), config)?;
//! host.add(GraphNode::new("a").with_port(Port::output("a-out", "sum", ["INT"])))?;
//! host.add(GraphNode::new("b").with_port(Port::input("b-in", "x", ["INT", "BOOL"])))?;
//! host.connect("a-out", "b-in")?;
//! host.frame();
//! ```

pub mod config;
pub mod connectivity;
pub mod cycle;
pub mod edge;
pub mod gesture;
pub mod graph_node;
pub mod host;
pub mod port;
pub mod scene;
pub mod surface;
pub mod ui;
pub mod view;

pub use config::{ConfigError, EditorConfig, LayoutConfig};
pub use connectivity::{ConnectError, Connectivity, Link};
pub use edge::Edge;
pub use gesture::{CancelReason, EdgeGesture, GestureOutcome, GestureState};
pub use graph_node::{GraphNode, GroupNode};
pub use host::{Host, PointerEvent};
pub use port::{Port, PortDirection};
pub use scene::{Entity, FrameStats, Scene, SceneError, SceneKey, SceneNode};
pub use surface::{ElementHandle, ElementKind, RetainedSurface, Surface, Visual};
pub use ui::GraphCanvas;
pub use view::ViewTransform;
