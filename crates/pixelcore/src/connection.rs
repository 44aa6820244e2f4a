use crate::error::GraphError;
use crate::pin::Pin;
use crate::types::{ConnectionId, NodeId, PinId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What travels along a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Data,
    Execution,
}

/// Immutable wire from an output pin to an input pin.
///
/// Only `Graph::connect` constructs these, and only after the pin pair
/// passed `Pin::check_connection`.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    output_pin: PinId,
    input_pin: PinId,
    output_node: NodeId,
    input_node: NodeId,
    kind: ConnectionKind,
    seq: u64,
}

impl Connection {
    pub(crate) fn new(output: &Pin, input: &Pin, seq: u64) -> Result<Self, GraphError> {
        output
            .check_connection(input)
            .map_err(|reason| GraphError::IncompatibleConnection {
                reason,
                output: output.descriptor(),
                input: input.descriptor(),
            })?;

        let kind = if output.pin_type().is_flow() {
            ConnectionKind::Execution
        } else {
            ConnectionKind::Data
        };

        Ok(Self {
            id: Uuid::new_v4(),
            output_pin: output.id(),
            input_pin: input.id(),
            output_node: output.node_id(),
            input_node: input.node_id(),
            kind,
            seq,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn output_pin(&self) -> PinId {
        self.output_pin
    }

    pub fn input_pin(&self) -> PinId {
        self.input_pin
    }

    pub fn output_node(&self) -> NodeId {
        self.output_node
    }

    pub fn input_node(&self) -> NodeId {
        self.input_node
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Creation order within the owning graph
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn touches_node(&self, node: NodeId) -> bool {
        self.output_node == node || self.input_node == node
    }
}
