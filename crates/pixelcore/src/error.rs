use crate::types::{ConnectionId, NodeId, PinDirection, PinId, PinType, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural errors raised synchronously by graph edits and ordering.
///
/// None of these leave the graph in a modified state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Cannot connect {output} to {input}: {reason}")]
    IncompatibleConnection {
        reason: ConnectRejection,
        output: PinDescriptor,
        input: PinDescriptor,
    },

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    #[error("Graph contains a cycle through {} node(s)", nodes.len())]
    CyclicGraph { nodes: Vec<NodeId> },

    #[error("Graph is busy with run {run_id}")]
    GraphBusy { run_id: RunId },

    #[error("Node kind '{kind}' declares pin '{name}' twice")]
    DuplicatePin { kind: String, name: String },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Run task aborted: {0}")]
    RunAborted(String),
}

/// Why a pair of pins cannot be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectRejection {
    SamePin,
    SameDirection,
    TypeMismatch,
}

impl fmt::Display for ConnectRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectRejection::SamePin => write!(f, "a pin cannot connect to itself"),
            ConnectRejection::SameDirection => write!(f, "both pins have the same direction"),
            ConnectRejection::TypeMismatch => write!(f, "incompatible pin types"),
        }
    }
}

/// Diagnostic view of a pin carried by connection errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDescriptor {
    pub pin_id: PinId,
    pub node_id: NodeId,
    pub name: String,
    pub pin_type: PinType,
    pub direction: PinDirection,
}

impl fmt::Display for PinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}, {})", self.name, self.pin_type, self.direction)
    }
}

/// The entity a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Node(NodeId),
    Pin(PinId),
    Connection(ConnectionId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Node(id) => write!(f, "Node {}", id),
            Missing::Pin(id) => write!(f, "Pin {}", id),
            Missing::Connection(id) => write!(f, "Connection {}", id),
        }
    }
}

/// Failure of a single node's processing step.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Node produced a value for unknown output '{0}'")]
    UnknownOutput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}
