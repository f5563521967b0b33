// SPDX-License-Identifier: MIT OR Apache-2.0
//! Committed connections between ports.
//!
//! [`Connectivity`] keeps at most one incoming connection per input port
//! and refuses any connection that would close a cycle between nodes.
//! All checks run before anything is mutated, so a failed
//! [`connect`](Connectivity::connect) leaves the graph as it was.

use crate::cycle;
use crate::edge::Edge;
use crate::port::PortDirection;
use crate::scene::{Entity, Scene, SceneError, SceneKey};
use crate::surface::Surface;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Connection errors, in the order `connect` checks them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// A port cannot be connected to itself
    #[error("Cannot connect port {0:?} to itself")]
    SelfConnection(String),

    /// Id not registered
    #[error("Port not found: {0:?}")]
    PortNotFound(String),

    /// Id registered, but not a port
    #[error("{0:?} is not a port")]
    NotAPort(String),

    /// Both ports are inputs, or both are outputs
    #[error("Ports {0:?} and {1:?} have the same direction")]
    DirectionMismatch(String, String),

    /// Both ports belong to the same node
    #[error("Cannot connect node {0:?} to itself")]
    SelfLoopOnNode(String),

    /// The input does not accept the output's primary type
    #[error("Input {input:?} does not accept {data_type:?}")]
    IncompatibleType {
        /// Primary type of the output, if it declares one
        data_type: Option<String>,
        /// Input port id
        input: String,
    },

    /// The input already has an incoming connection
    #[error("Input {0:?} is already connected")]
    InputAlreadyConnected(String),

    /// The connection would close a cycle between nodes
    #[error("Connection would create a cycle through {cycle:?}")]
    CyclicConnection {
        /// Node ids along the first cycle found
        cycle: Vec<String>,
    },

    /// The edge could not be mounted
    #[error("Failed to mount edge: {0}")]
    Mount(#[from] SceneError),
}

/// Index entry for a connected input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// The output port feeding the input
    pub source: SceneKey,
    /// The committed edge
    pub edge: SceneKey,
}

/// Connection index plus the set of committed edges
#[derive(Debug, Clone)]
pub struct Connectivity {
    edge_layer: SceneKey,
    /// Keyed by input port
    index: IndexMap<SceneKey, Link>,
    committed: IndexSet<SceneKey>,
}

impl Connectivity {
    /// Create an empty index whose edges mount under `edge_layer`
    pub fn new(edge_layer: SceneKey) -> Self {
        Self {
            edge_layer,
            index: IndexMap::new(),
            committed: IndexSet::new(),
        }
    }

    /// The layer committed edges mount under
    pub fn edge_layer(&self) -> SceneKey {
        self.edge_layer
    }

    /// Connect two ports given in either order and return the new edge
    pub fn connect<S: Surface>(
        &mut self,
        scene: &mut Scene<S>,
        source_id: &str,
        target_id: &str,
    ) -> Result<SceneKey, ConnectError> {
        let result = self.try_connect(scene, source_id, target_id);
        match &result {
            Ok(edge) => tracing::debug!("Connected {:?} -> {:?} as {}", source_id, target_id, edge),
            Err(err) => tracing::warn!("Rejected connection {:?} -> {:?}: {}", source_id, target_id, err),
        }
        result
    }

    fn try_connect<S: Surface>(
        &mut self,
        scene: &mut Scene<S>,
        source_id: &str,
        target_id: &str,
    ) -> Result<SceneKey, ConnectError> {
        if source_id == target_id {
            return Err(ConnectError::SelfConnection(source_id.to_string()));
        }

        let resolve = |id: &str| {
            scene
                .lookup(id)
                .filter(|key| scene.node(*key).is_some_and(|node| node.is_mounted()))
                .ok_or_else(|| ConnectError::PortNotFound(id.to_string()))
        };
        let source = resolve(source_id)?;
        let target = resolve(target_id)?;

        let port = |key: SceneKey, id: &str| {
            scene
                .node(key)
                .and_then(|node| node.as_port())
                .ok_or_else(|| ConnectError::NotAPort(id.to_string()))
        };
        let source_port = port(source, source_id)?;
        let target_port = port(target, target_id)?;

        if source_port.direction() == target_port.direction() {
            return Err(ConnectError::DirectionMismatch(
                source_id.to_string(),
                target_id.to_string(),
            ));
        }

        let ((output, output_port), (input, input_port)) = match source_port.direction() {
            PortDirection::Output => ((source, source_port), (target, target_port)),
            PortDirection::Input => ((target, target_port), (source, source_port)),
        };

        let (output_owner, input_owner) = (output_port.owner(), input_port.owner());
        if output_owner == input_owner {
            let node = output_owner
                .and_then(|key| scene.node(key))
                .map_or_else(String::new, |node| node.id().to_string());
            return Err(ConnectError::SelfLoopOnNode(node));
        }

        let data_type = output_port.primary_type();
        if !data_type.is_some_and(|t| input_port.accepts(t)) {
            return Err(ConnectError::IncompatibleType {
                data_type: data_type.map(str::to_string),
                input: input_port.id().to_string(),
            });
        }

        if self.index.contains_key(&input) {
            return Err(ConnectError::InputAlreadyConnected(input_port.id().to_string()));
        }

        // Speculative commit, rolled back if the node graph becomes cyclic
        let edge = scene.insert(Entity::Edge(Edge::new(output, input)));
        self.committed.insert(edge);
        let cycles = cycle::detect_cycles(&self.node_graph(scene));
        if let Some(found) = cycles.first() {
            let cycle = found
                .iter()
                .filter_map(|key| scene.node(*key))
                .map(|node| node.id().to_string())
                .collect();
            self.committed.shift_remove(&edge);
            scene.remove(edge);
            return Err(ConnectError::CyclicConnection { cycle });
        }

        if let Err(err) = scene.add_child(self.edge_layer, None, edge) {
            self.committed.shift_remove(&edge);
            scene.remove(edge);
            return Err(err.into());
        }
        self.index.insert(input, Link { source: output, edge });
        Ok(edge)
    }

    /// Committed edges projected onto the nodes owning their ports
    fn node_graph<S: Surface>(&self, scene: &Scene<S>) -> cycle::Adjacency<SceneKey> {
        cycle::adjacency(self.committed.iter().filter_map(|edge| {
            let edge = scene.node(*edge)?.as_edge()?;
            let from = scene.owner_of(edge.source())?;
            let to = scene.owner_of(edge.target()?)?;
            Some((from, to))
        }))
    }

    /// Remove a committed edge, its index entry and its visual
    ///
    /// Returns the input port and the entry that was removed.
    pub fn remove_link<S: Surface>(
        &mut self,
        scene: &mut Scene<S>,
        edge: SceneKey,
    ) -> Option<(SceneKey, Link)> {
        let position = self.index.values().position(|link| link.edge == edge)?;
        let (input, link) = self.index.shift_remove_index(position)?;
        self.committed.shift_remove(&edge);
        scene.remove(edge);
        tracing::debug!("Removed connection {} into {}", edge, input);
        Some((input, link))
    }

    /// The index entry whose edge touches `port` at either end
    pub fn link_from_port(&self, port: SceneKey) -> Option<(SceneKey, Link)> {
        self.index
            .iter()
            .find(|(input, link)| **input == port || link.source == port)
            .map(|(input, link)| (*input, *link))
    }

    /// Every committed edge touching `port`
    pub fn links_touching(&self, port: SceneKey) -> Vec<SceneKey> {
        self.index
            .iter()
            .filter(|(input, link)| **input == port || link.source == port)
            .map(|(_, link)| link.edge)
            .collect()
    }

    /// The entry feeding an input port
    pub fn link_for_input(&self, input: SceneKey) -> Option<Link> {
        self.index.get(&input).copied()
    }

    /// Connected inputs with their entries, in commit order
    pub fn links(&self) -> impl Iterator<Item = (SceneKey, Link)> + '_ {
        self.index.iter().map(|(input, link)| (*input, *link))
    }

    /// Committed edges in commit order
    pub fn committed(&self) -> impl Iterator<Item = SceneKey> + '_ {
        self.committed.iter().copied()
    }

    /// Whether `edge` is committed
    pub fn contains(&self, edge: SceneKey) -> bool {
        self.committed.contains(&edge)
    }

    /// Number of committed edges
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Whether nothing is connected
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::graph_node::{GraphNode, GroupNode};
    use crate::port::Port;
    use crate::surface::RetainedSurface;

    struct Fixture {
        scene: Scene<RetainedSurface>,
        links: Connectivity,
        nodes: SceneKey,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scene = Scene::new(RetainedSurface::default(), &EditorConfig::default());
            let edges = scene.insert(Entity::Group(GroupNode::new()));
            scene.mount(edges, None, None).unwrap();
            let nodes = scene.insert(Entity::Group(GroupNode::new()));
            scene.mount(nodes, None, None).unwrap();
            Self {
                scene,
                links: Connectivity::new(edges),
                nodes,
            }
        }

        fn add(&mut self, node: GraphNode) -> SceneKey {
            let key = self.scene.insert(Entity::Graph(node));
            self.scene.add_child(self.nodes, None, key).unwrap();
            key
        }

        /// A node with one INT input `<id>.in` and one INT output `<id>.out`
        fn pass_through(&mut self, id: &str) -> SceneKey {
            self.add(
                GraphNode::new(id)
                    .with_port(Port::input(format!("{id}.in"), "in", ["INT"]))
                    .with_port(Port::output(format!("{id}.out"), "out", ["INT"])),
            )
        }

        fn connect(&mut self, source: &str, target: &str) -> Result<SceneKey, ConnectError> {
            self.links.connect(&mut self.scene, source, target)
        }

        fn key(&self, id: &str) -> SceneKey {
            self.scene.lookup(id).unwrap()
        }
    }

    #[test]
    fn test_self_connection_is_checked_first() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        assert_eq!(
            fx.connect("a.in", "a.in"),
            Err(ConnectError::SelfConnection("a.in".into()))
        );
        assert_eq!(
            fx.connect("nope", "nope"),
            Err(ConnectError::SelfConnection("nope".into()))
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");

        assert_eq!(
            fx.connect("a.out", "missing"),
            Err(ConnectError::PortNotFound("missing".into()))
        );
        assert_eq!(fx.connect("a.out", "b"), Err(ConnectError::NotAPort("b".into())));
        assert_eq!(
            fx.connect("a.out", "b.out"),
            Err(ConnectError::DirectionMismatch("a.out".into(), "b.out".into()))
        );
        assert_eq!(
            fx.connect("a.in", "b.in"),
            Err(ConnectError::DirectionMismatch("a.in".into(), "b.in".into()))
        );
        assert_eq!(
            fx.connect("a.out", "a.in"),
            Err(ConnectError::SelfLoopOnNode("a".into()))
        );
        assert!(fx.links.is_empty());
    }

    #[test]
    fn test_argument_order_is_canonicalized() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");

        let edge = fx.connect("b.in", "a.out").unwrap();
        let current = fx.scene.node(edge).unwrap().as_edge().unwrap();
        assert_eq!(current.source(), fx.key("a.out"));
        assert_eq!(current.target(), Some(fx.key("b.in")));
        assert!(current.is_connected());
    }

    #[test]
    fn test_single_inbound() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");
        fx.pass_through("c");

        fx.connect("a.out", "c.in").unwrap();
        assert_eq!(
            fx.connect("b.out", "c.in"),
            Err(ConnectError::InputAlreadyConnected("c.in".into()))
        );
        let link = fx.links.link_for_input(fx.key("c.in")).unwrap();
        assert_eq!(link.source, fx.key("a.out"));
        assert_eq!(fx.links.len(), 1);
    }

    #[test]
    fn test_outputs_fan_out() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");
        fx.pass_through("c");

        fx.connect("a.out", "b.in").unwrap();
        fx.connect("a.out", "c.in").unwrap();
        assert_eq!(fx.links.links_touching(fx.key("a.out")).len(), 2);
    }

    #[test]
    fn test_type_compatibility() {
        let mut fx = Fixture::new();
        fx.add(GraphNode::new("sink").with_port(Port::input("sink.in", "in", ["INT", "BOOL"])));
        fx.add(GraphNode::new("flag").with_port(Port::output("flag.out", "out", ["BOOL"])));
        fx.add(GraphNode::new("text").with_port(Port::output("text.out", "out", ["STRING"])));

        assert_eq!(
            fx.connect("text.out", "sink.in"),
            Err(ConnectError::IncompatibleType {
                data_type: Some("STRING".into()),
                input: "sink.in".into(),
            })
        );
        assert!(fx.connect("flag.out", "sink.in").is_ok());
    }

    #[test]
    fn test_untyped_output_is_incompatible() {
        let mut fx = Fixture::new();
        fx.add(GraphNode::new("sink").with_port(Port::input("sink.in", "in", ["INT"])));
        fx.add(GraphNode::new("src").with_port(Port::output("src.out", "out", Vec::<String>::new())));
        assert!(matches!(
            fx.connect("src.out", "sink.in"),
            Err(ConnectError::IncompatibleType { data_type: None, .. })
        ));
    }

    #[test]
    fn test_cycle_is_rolled_back() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");
        fx.pass_through("c");

        let ab = fx.connect("a.out", "b.in").unwrap();
        let bc = fx.connect("b.out", "c.in").unwrap();
        let nodes_before = fx.scene.len();

        let err = fx.connect("c.out", "a.in").unwrap_err();
        assert_eq!(
            err,
            ConnectError::CyclicConnection {
                cycle: vec!["a".into(), "b".into(), "c".into()]
            }
        );
        assert_eq!(fx.links.committed().collect::<Vec<_>>(), vec![ab, bc]);
        assert!(fx.links.link_for_input(fx.key("a.in")).is_none());
        assert_eq!(fx.scene.len(), nodes_before);
    }

    #[test]
    fn test_parallel_edges_are_not_a_cycle() {
        let mut fx = Fixture::new();
        fx.add(
            GraphNode::new("a")
                .with_port(Port::output("a.x", "x", ["INT"]))
                .with_port(Port::output("a.y", "y", ["INT"])),
        );
        fx.add(
            GraphNode::new("b")
                .with_port(Port::input("b.x", "x", ["INT"]))
                .with_port(Port::input("b.y", "y", ["INT"])),
        );
        fx.connect("a.x", "b.x").unwrap();
        fx.connect("a.y", "b.y").unwrap();
        assert_eq!(fx.links.len(), 2);
    }

    #[test]
    fn test_remove_link() {
        let mut fx = Fixture::new();
        fx.pass_through("a");
        fx.pass_through("b");
        let edge = fx.connect("a.out", "b.in").unwrap();
        let edge_id = fx.scene.node(edge).unwrap().id().to_string();

        let (input, link) = fx.links.link_from_port(fx.key("a.out")).unwrap();
        assert_eq!(input, fx.key("b.in"));
        assert_eq!(link.edge, edge);

        assert!(fx.links.remove_link(&mut fx.scene, edge).is_some());
        assert!(fx.links.is_empty());
        assert!(fx.scene.lookup(&edge_id).is_none());
        assert!(fx.links.remove_link(&mut fx.scene, edge).is_none());

        // The input is free again
        assert!(fx.connect("a.out", "b.in").is_ok());
    }
}
