//! Node graph: ownership of nodes and connections, edit operations and
//! execution ordering.
//!
//! Pins live inside their node; the graph keeps a pin-id index so that
//! connections and callers can refer to pins by id alone.

use crate::connection::Connection;
use crate::node::{Node, NodeMetadata, NodeOutput};
use crate::pin::Pin;
use crate::registry::NodeRegistry;
use crate::types::{ConnectionId, NodeId, NodeStatus, PinDirection, PinId, PinType, Position, RunId};
use crate::{GraphError, Missing, NodeError, Value};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Graph shared between editing callers and the execution engine
pub type SharedGraph = Arc<RwLock<Graph>>;

/// A node placed in a graph, owning its pins
pub struct GraphNode {
    id: NodeId,
    kind: String,
    metadata: NodeMetadata,
    position: Position,
    inputs: Vec<Pin>,
    outputs: Vec<Pin>,
    status: NodeStatus,
    seq: u64,
    behavior: Arc<dyn Node>,
}

impl GraphNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.metadata.display_name
    }

    pub fn category(&self) -> &str {
        &self.metadata.category
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Creation order within the graph
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn inputs(&self) -> &[Pin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Pin] {
        &self.outputs
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn input(&self, name: &str) -> Option<&Pin> {
        self.inputs.iter().find(|p| p.name() == name)
    }

    pub fn output(&self, name: &str) -> Option<&Pin> {
        self.outputs.iter().find(|p| p.name() == name)
    }

    pub fn pin_by_name(&self, direction: PinDirection, name: &str) -> Option<&Pin> {
        match direction {
            PinDirection::Input => self.input(name),
            PinDirection::Output => self.output(name),
        }
    }

    fn side_mut(&mut self, direction: PinDirection) -> &mut Vec<Pin> {
        match direction {
            PinDirection::Input => &mut self.inputs,
            PinDirection::Output => &mut self.outputs,
        }
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("status", &self.status)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct PinLocation {
    node: NodeId,
    direction: PinDirection,
    index: usize,
}

/// Inputs gathered for one node, ready to be handed to `Node::process`
pub struct PreparedNode {
    pub behavior: Arc<dyn Node>,
    pub kind: String,
    pub inputs: HashMap<String, Value>,
    pub output_defaults: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub connections: usize,
    pub pins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    pub node_id: Option<NodeId>,
    pub pin_id: Option<PinId>,
}

/// Outcome of `Graph::validate`. Warnings do not make a graph invalid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Collection of nodes and the connections between their pins
pub struct Graph {
    registry: Arc<NodeRegistry>,
    nodes: HashMap<NodeId, GraphNode>,
    connections: HashMap<ConnectionId, Connection>,
    pin_index: HashMap<PinId, PinLocation>,
    next_seq: u64,
    active_run: Option<RunId>,
}

impl Graph {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            nodes: HashMap::new(),
            connections: HashMap::new(),
            pin_index: HashMap::new(),
            next_seq: 0,
            active_run: None,
        }
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Nodes in creation order
    pub fn nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.seq);
        nodes
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        let loc = self.pin_index.get(&id)?;
        let node = self.nodes.get(&loc.node)?;
        match loc.direction {
            PinDirection::Input => node.inputs.get(loc.index),
            PinDirection::Output => node.outputs.get(loc.index),
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Connections in creation order
    pub fn connections(&self) -> Vec<&Connection> {
        let mut connections: Vec<&Connection> = self.connections.values().collect();
        connections.sort_by_key(|c| c.seq());
        connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            connections: self.connections.len(),
            pins: self.pin_index.len(),
        }
    }

    /// Nodes feeding `node` directly, without duplicates
    pub fn dependencies_of(&self, node: NodeId) -> Vec<NodeId> {
        let mut deps: Vec<&Connection> = self
            .connections
            .values()
            .filter(|c| c.input_node() == node)
            .collect();
        deps.sort_by_key(|c| c.seq());

        let mut seen = HashSet::new();
        deps.into_iter()
            .map(|c| c.output_node())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.active_run.is_some()
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    /// Claims the graph for a run. Structural edits fail with `GraphBusy`
    /// until `end_run` is called with the same id.
    pub fn begin_run(&mut self, run_id: RunId) -> Result<(), GraphError> {
        self.ensure_idle()?;
        self.active_run = Some(run_id);
        for node in self.nodes.values_mut() {
            node.status = NodeStatus::Idle;
        }
        Ok(())
    }

    pub fn end_run(&mut self, run_id: RunId) {
        if self.active_run == Some(run_id) {
            self.active_run = None;
        }
    }

    fn ensure_idle(&self) -> Result<(), GraphError> {
        match self.active_run {
            Some(run_id) => Err(GraphError::GraphBusy { run_id }),
            None => Ok(()),
        }
    }

    /// Instantiate a registered node kind at `position`
    pub fn add_node(&mut self, kind: &str, position: Position) -> Result<NodeId, GraphError> {
        self.ensure_idle()?;

        let (behavior, metadata) = self.registry.create_node(kind)?;
        let layout = behavior.declare_pins();
        if let Some(name) = layout.duplicate_name() {
            return Err(GraphError::DuplicatePin {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }

        let id = Uuid::new_v4();
        let inputs: Vec<Pin> = layout
            .inputs
            .into_iter()
            .map(|spec| Pin::from_spec(id, PinDirection::Input, spec))
            .collect();
        let outputs: Vec<Pin> = layout
            .outputs
            .into_iter()
            .map(|spec| Pin::from_spec(id, PinDirection::Output, spec))
            .collect();

        for (direction, side) in [(PinDirection::Input, &inputs), (PinDirection::Output, &outputs)] {
            for (index, pin) in side.iter().enumerate() {
                self.pin_index.insert(
                    pin.id(),
                    PinLocation {
                        node: id,
                        direction,
                        index,
                    },
                );
            }
        }

        let seq = self.bump_seq();
        self.nodes.insert(
            id,
            GraphNode {
                id,
                kind: kind.to_string(),
                metadata,
                position,
                inputs,
                outputs,
                status: NodeStatus::Idle,
                seq,
                behavior,
            },
        );

        tracing::debug!(node_id = %id, kind, "added node");
        Ok(id)
    }

    /// Sever every connection of the node, then drop the node and its pins
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.ensure_idle()?;

        let node = self.nodes.get(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;
        let incident: BTreeSet<ConnectionId> = node.pins().flat_map(|p| p.connections()).collect();

        for connection_id in &incident {
            self.remove_connection_entry(*connection_id);
        }

        if let Some(node) = self.nodes.remove(&id) {
            for pin in node.pins() {
                self.pin_index.remove(&pin.id());
            }
            tracing::debug!(
                node_id = %id,
                kind = %node.kind,
                severed = incident.len(),
                "removed node"
            );
        }
        Ok(())
    }

    /// Connect two pins, replacing whatever occupies a single-connection
    /// endpoint.
    ///
    /// The pins may be given in either order; the output-direction pin
    /// always becomes the connection's source. Connecting a pair that is
    /// already wired returns the existing connection.
    pub fn connect(&mut self, output_pin: PinId, input_pin: PinId) -> Result<ConnectionId, GraphError> {
        self.ensure_idle()?;

        let first = self.pin(output_pin).ok_or(GraphError::NotFound(Missing::Pin(output_pin)))?;
        let second = self.pin(input_pin).ok_or(GraphError::NotFound(Missing::Pin(input_pin)))?;

        if let Err(reason) = first.check_connection(second) {
            tracing::debug!(
                output = %first.name(),
                input = %second.name(),
                %reason,
                "rejected connection"
            );
            return Err(GraphError::IncompatibleConnection {
                reason,
                output: first.descriptor(),
                input: second.descriptor(),
            });
        }

        let (out, inp) = if first.is_output() {
            (first, second)
        } else {
            (second, first)
        };

        if let Some(existing) = out
            .connections()
            .find(|c| self.connections.get(c).map(|c| c.input_pin()) == Some(inp.id()))
        {
            return Ok(existing);
        }

        let mut replaced: BTreeSet<ConnectionId> = BTreeSet::new();
        if !out.is_multiple() {
            replaced.extend(out.connections());
        }
        if !inp.is_multiple() {
            replaced.extend(inp.connections());
        }

        let seq = self.next_seq;
        let connection = Connection::new(out, inp, seq)?;
        self.bump_seq();

        for old in replaced {
            if let Some(removed) = self.remove_connection_entry(old) {
                tracing::debug!(connection_id = %removed.id(), "auto-replaced connection");
            }
        }

        let id = connection.id();
        let (out_id, in_id) = (connection.output_pin(), connection.input_pin());
        self.connections.insert(id, connection);
        if let Some(pin) = self.pin_mut(out_id) {
            pin.attach(id);
        }
        if let Some(pin) = self.pin_mut(in_id) {
            pin.attach(id);
        }

        tracing::debug!(connection_id = %id, "connected pins");
        Ok(id)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        self.ensure_idle()?;
        self.remove_connection_entry(id)
            .map(|_| ())
            .ok_or(GraphError::NotFound(Missing::Connection(id)))
    }

    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;
        node.position = position;
        Ok(())
    }

    pub fn rename_node(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;
        node.metadata.display_name = name.into();
        Ok(())
    }

    /// Edit the default value of a pin. For variable nodes this is the
    /// constant they emit.
    pub fn set_pin_default(&mut self, id: PinId, value: impl Into<Value>) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let pin = self.pin_mut(id).ok_or(GraphError::NotFound(Missing::Pin(id)))?;
        pin.set_default_value(value.into());
        Ok(())
    }

    /// Remove every node and connection
    pub fn clear(&mut self) -> Result<(), GraphError> {
        self.ensure_idle()?;
        self.connections.clear();
        self.nodes.clear();
        self.pin_index.clear();
        tracing::debug!("cleared graph");
        Ok(())
    }

    fn remove_connection_entry(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        if let Some(pin) = self.pin_mut(connection.output_pin()) {
            pin.detach(id);
        }
        if let Some(pin) = self.pin_mut(connection.input_pin()) {
            pin.detach(id);
        }
        Some(connection)
    }

    pub(crate) fn pin_mut(&mut self, id: PinId) -> Option<&mut Pin> {
        let loc = *self.pin_index.get(&id)?;
        self.nodes
            .get_mut(&loc.node)?
            .side_mut(loc.direction)
            .get_mut(loc.index)
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Topological order of all nodes (Kahn's algorithm). Ties between
    /// ready nodes go to the one created first.
    pub fn calculate_execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        self.order_nodes(None)
    }

    /// Topological order of `target` and everything it transitively
    /// depends on, ending with `target`.
    pub fn execution_order_for(&self, target: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::NotFound(Missing::Node(target)));
        }

        let mut upstream = HashSet::from([target]);
        let mut queue = VecDeque::from([target]);
        while let Some(current) = queue.pop_front() {
            for dep in self.dependencies_of(current) {
                if upstream.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }

        self.order_nodes(Some(&upstream))
    }

    fn order_nodes(&self, scope: Option<&HashSet<NodeId>>) -> Result<Vec<NodeId>, GraphError> {
        let in_scope = |id: &NodeId| scope.map_or(true, |s| s.contains(id));

        let mut in_degree: HashMap<NodeId, usize> = self
            .nodes
            .keys()
            .filter(|id| in_scope(*id))
            .map(|id| (*id, 0))
            .collect();
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for conn in self.connections.values() {
            let (from, to) = (conn.output_node(), conn.input_node());
            if !in_scope(&from) || !in_scope(&to) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&to) {
                *degree += 1;
            }
            successors.entry(from).or_default().push(to);
        }

        let mut ready: BinaryHeap<Reverse<(u64, NodeId)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| Reverse((self.nodes[id].seq, *id)))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            for next in successors.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.nodes[next].seq, *next)));
                    }
                }
            }
        }

        if order.len() != in_degree.len() {
            let stuck: HashSet<NodeId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(GraphError::CyclicGraph {
                nodes: self.cycle_members(&stuck),
            });
        }

        Ok(order)
    }

    /// Nodes of `stuck` lying on a cycle, in creation order. Nodes that are
    /// merely downstream of a cycle are left out.
    fn cycle_members(&self, stuck: &HashSet<NodeId>) -> Vec<NodeId> {
        let mut graph = DiGraph::<NodeId, ()>::new();
        let indices: HashMap<NodeId, _> = stuck.iter().map(|id| (*id, graph.add_node(*id))).collect();

        for conn in self.connections.values() {
            if let (Some(from), Some(to)) = (
                indices.get(&conn.output_node()),
                indices.get(&conn.input_node()),
            ) {
                graph.add_edge(*from, *to, ());
            }
        }

        let mut members: Vec<NodeId> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some())
            .flatten()
            .map(|idx| graph[idx])
            .collect();
        members.sort_by_key(|id| self.nodes[id].seq);
        members
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Err(GraphError::CyclicGraph { nodes }) = self.calculate_execution_order() {
            report.errors.push(ValidationIssue {
                message: format!("Graph contains a cycle through {} node(s)", nodes.len()),
                node_id: nodes.first().copied(),
                pin_id: None,
            });
        }

        for node in self.nodes() {
            if self.nodes.len() > 1 && !node.pins().any(Pin::is_connected) {
                report.warnings.push(ValidationIssue {
                    message: format!("Node '{}' has no connections", node.name()),
                    node_id: Some(node.id),
                    pin_id: None,
                });
            }

            for pin in node.inputs.iter().filter(|p| p.pin_type() == PinType::Image) {
                if !pin.is_connected() && pin.default_value().is_null() {
                    report.warnings.push(ValidationIssue {
                        message: format!(
                            "Input '{}' of node '{}' has no source",
                            pin.name(),
                            node.name()
                        ),
                        node_id: Some(node.id),
                        pin_id: Some(pin.id()),
                    });
                }
            }
        }

        report
    }

    /// Pull values into the node's input pins and mark it running.
    ///
    /// Each input takes the value of the output pin wired to it; outputs of
    /// nodes in `skip_sources` count as absent. An input without a live
    /// source falls back to its default. Multi-connection inputs receive
    /// an array of all live sources in connection order.
    pub fn prepare_node(
        &mut self,
        id: NodeId,
        skip_sources: &HashSet<NodeId>,
    ) -> Result<PreparedNode, GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;

        let mut pulled: Vec<Value> = Vec::with_capacity(node.inputs.len());
        for pin in &node.inputs {
            let mut sources: Vec<&Connection> = pin
                .connections()
                .filter_map(|c| self.connections.get(&c))
                .filter(|c| !skip_sources.contains(&c.output_node()))
                .collect();
            sources.sort_by_key(|c| c.seq());

            let mut values: Vec<Value> = sources
                .into_iter()
                .filter_map(|c| self.pin(c.output_pin()))
                .map(|source| source.value().clone())
                .collect();

            let value = if values.is_empty() {
                pin.default_value().clone()
            } else if pin.is_multiple() {
                Value::Array(values)
            } else {
                values.swap_remove(0)
            };
            pulled.push(value);
        }

        let node = self.nodes.get_mut(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;
        let mut inputs = HashMap::with_capacity(pulled.len());
        for (pin, value) in node.inputs.iter_mut().zip(pulled) {
            pin.set_value(value.clone());
            inputs.insert(pin.name().to_string(), value);
        }
        let output_defaults = node
            .outputs
            .iter()
            .map(|p| (p.name().to_string(), p.default_value().clone()))
            .collect();
        node.status = NodeStatus::Running;

        Ok(PreparedNode {
            behavior: node.behavior.clone(),
            kind: node.kind.clone(),
            inputs,
            output_defaults,
        })
    }

    /// Record the outcome of a node's processing step.
    ///
    /// Outputs are written all-or-nothing: a value for an unknown output
    /// pin fails the node. A failed node's outputs fall back to their
    /// defaults. Returns the node's error, if it failed.
    pub fn record_outcome(
        &mut self,
        id: NodeId,
        outcome: Result<NodeOutput, NodeError>,
    ) -> Result<Option<NodeError>, GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NotFound(Missing::Node(id)))?;

        let checked = outcome.and_then(|output| {
            match output
                .outputs
                .keys()
                .find(|name| !node.outputs.iter().any(|p| p.name() == name.as_str()))
            {
                Some(unknown) => Err(NodeError::UnknownOutput(unknown.clone())),
                None => Ok(output),
            }
        });

        match checked {
            Ok(output) => {
                for (name, value) in output.outputs {
                    if let Some(pin) = node.outputs.iter_mut().find(|p| p.name() == name) {
                        pin.set_value(value);
                    }
                }
                node.status = NodeStatus::Done;
                Ok(None)
            }
            Err(e) => {
                for pin in node.outputs.iter_mut() {
                    let reset = pin.default_value().clone();
                    pin.set_value(reset);
                }
                node.status = NodeStatus::Failed;
                Ok(Some(e))
            }
        }
    }

    /// Nodes the run never reached
    pub fn mark_not_run(&mut self, ids: &[NodeId]) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.status = NodeStatus::NotRun;
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("active_run", &self.active_run)
            .finish()
    }
}
