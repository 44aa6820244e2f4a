use crate::graph::Graph;
use crate::registry::NodeRegistry;
use crate::types::{ConnectionId, NodeId, PinDirection, PinId, Position};
use crate::{FlowError, GraphError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const SNAPSHOT_VERSION: &str = "1.0";

/// Serializable image of a graph's topology and pin values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: String,
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: String,
    pub name: String,
    pub position: Position,
    pub pins: Vec<PinRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
    pub id: PinId,
    pub name: String,
    pub direction: PinDirection,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub default_value: Value,
}

/// A connection, by pin id. Node ids and pin names are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub output_pin_id: PinId,
    pub input_pin_id: PinId,
    #[serde(default)]
    pub output_node_id: Option<NodeId>,
    #[serde(default)]
    pub input_node_id: Option<NodeId>,
    #[serde(default)]
    pub output_pin_name: Option<String>,
    #[serde(default)]
    pub input_pin_name: Option<String>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Graph {
    /// Export nodes and connections in creation order
    pub fn export(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .into_iter()
            .map(|node| NodeRecord {
                id: node.id(),
                kind: node.kind().to_string(),
                name: node.name().to_string(),
                position: node.position(),
                pins: node
                    .pins()
                    .map(|pin| PinRecord {
                        id: pin.id(),
                        name: pin.name().to_string(),
                        direction: pin.direction(),
                        value: pin.value().clone(),
                        default_value: pin.default_value().clone(),
                    })
                    .collect(),
            })
            .collect();

        let connections = self
            .connections()
            .into_iter()
            .map(|conn| ConnectionRecord {
                id: conn.id(),
                output_pin_id: conn.output_pin(),
                input_pin_id: conn.input_pin(),
                output_node_id: Some(conn.output_node()),
                input_node_id: Some(conn.input_node()),
                output_pin_name: self.pin(conn.output_pin()).map(|p| p.name().to_string()),
                input_pin_name: self.pin(conn.input_pin()).map(|p| p.name().to_string()),
            })
            .collect();

        GraphSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            nodes,
            connections,
        }
    }

    /// Rebuild a graph from a snapshot. Node, pin and connection ids are
    /// regenerated; topology and pin values are reproduced exactly.
    pub fn import(registry: Arc<NodeRegistry>, snapshot: &GraphSnapshot) -> Result<Graph, GraphError> {
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                version = %snapshot.version,
                expected = SNAPSHOT_VERSION,
                "loading snapshot with unexpected version"
            );
        }

        let mut graph = Graph::new(registry);
        let mut pin_map: HashMap<PinId, PinId> = HashMap::new();

        for record in &snapshot.nodes {
            let node_id = graph.add_node(&record.kind, record.position)?;
            if !record.name.is_empty() {
                graph.rename_node(node_id, record.name.clone())?;
            }

            for pin_record in &record.pins {
                let new_id = graph
                    .node(node_id)
                    .and_then(|n| n.pin_by_name(pin_record.direction, &pin_record.name))
                    .map(|p| p.id())
                    .ok_or_else(|| {
                        GraphError::InvalidSnapshot(format!(
                            "node kind '{}' has no {} pin '{}'",
                            record.kind, pin_record.direction, pin_record.name
                        ))
                    })?;

                if let Some(pin) = graph.pin_mut(new_id) {
                    pin.restore(pin_record.value.clone(), pin_record.default_value.clone());
                }
                pin_map.insert(pin_record.id, new_id);
            }
        }

        for record in &snapshot.connections {
            let resolve = |old: PinId| {
                pin_map.get(&old).copied().ok_or_else(|| {
                    GraphError::InvalidSnapshot(format!(
                        "connection {} references unknown pin {}",
                        record.id, old
                    ))
                })
            };
            let output = resolve(record.output_pin_id)?;
            let input = resolve(record.input_pin_id)?;
            graph.connect(output, input)?;
        }

        tracing::info!(
            nodes = graph.node_count(),
            connections = graph.connection_count(),
            "graph imported"
        );
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, FlowError> {
        self.export().to_json()
    }

    pub fn from_json(registry: Arc<NodeRegistry>, json: &str) -> Result<Graph, FlowError> {
        let snapshot = GraphSnapshot::from_json(json)?;
        Ok(Graph::import(registry, &snapshot)?)
    }
}
