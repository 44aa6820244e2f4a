//! Core abstractions for the pixelflow graph engine
//!
//! This crate provides the typed pin/connection model, the node trait and
//! registry, and the graph with its ordering and snapshot support. It does
//! not execute anything itself.

mod connection;
mod error;
pub mod events;
mod graph;
mod node;
mod pin;
mod registry;
mod snapshot;
mod types;
mod value;

pub use connection::{Connection, ConnectionKind};
pub use error::{ConnectRejection, FlowError, GraphError, Missing, NodeError, PinDescriptor};
pub use events::*;
pub use graph::{
    Graph, GraphNode, GraphStats, PreparedNode, SharedGraph, ValidationIssue, ValidationReport,
};
pub use node::{Node, NodeContext, NodeMetadata, NodeOutput};
pub use pin::{Pin, PinLayout, PinSpec};
pub use registry::{NodeFactory, NodeRegistry};
pub use snapshot::{ConnectionRecord, GraphSnapshot, NodeRecord, PinRecord, SNAPSHOT_VERSION};
pub use types::{
    compatible, ConnectionId, NodeId, NodeStatus, PinDirection, PinId, PinType, Position, RunId,
};
pub use value::{ImageData, Value};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
