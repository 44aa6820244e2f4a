use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type NodeId = Uuid;
pub type PinId = Uuid;
pub type ConnectionId = Uuid;
pub type RunId = Uuid;

/// Kind of value a pin carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinType {
    /// Execution flow marker, never carries data
    Exec,
    Bool,
    Int,
    Float,
    String,
    Path,
    Image,
    Color,
    Vector2,
    Vector3,
    Matrix,
    Array,
    Dict,
    /// Wildcard, matches any data type
    Any,
}

impl PinType {
    pub const ALL: [PinType; 14] = [
        PinType::Exec,
        PinType::Bool,
        PinType::Int,
        PinType::Float,
        PinType::String,
        PinType::Path,
        PinType::Image,
        PinType::Color,
        PinType::Vector2,
        PinType::Vector3,
        PinType::Matrix,
        PinType::Array,
        PinType::Dict,
        PinType::Any,
    ];

    pub fn is_flow(&self) -> bool {
        matches!(self, PinType::Exec)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PinType::Exec => "exec",
            PinType::Bool => "bool",
            PinType::Int => "int",
            PinType::Float => "float",
            PinType::String => "string",
            PinType::Path => "path",
            PinType::Image => "image",
            PinType::Color => "color",
            PinType::Vector2 => "vector2",
            PinType::Vector3 => "vector3",
            PinType::Matrix => "matrix",
            PinType::Array => "array",
            PinType::Dict => "dict",
            PinType::Any => "any",
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a value of `output` type may flow into an `input` pin.
///
/// Rules are checked in order: flow pins only pair with flow pins, the
/// wildcard pairs with any data type, int/float convert both ways,
/// path/string convert both ways, anything else must match exactly.
pub fn compatible(output: PinType, input: PinType) -> bool {
    if output.is_flow() || input.is_flow() {
        return output.is_flow() && input.is_flow();
    }
    if output == PinType::Any || input == PinType::Any {
        return true;
    }
    match (output, input) {
        (PinType::Int, PinType::Float) | (PinType::Float, PinType::Int) => true,
        (PinType::Path, PinType::String) | (PinType::String, PinType::Path) => true,
        (a, b) => a == b,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
}

impl fmt::Display for PinDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinDirection::Input => f.write_str("input"),
            PinDirection::Output => f.write_str("output"),
        }
    }
}

/// Node position in the visual editor. Never read by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Execution status of a node, within the graph and within a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Idle,
    Running,
    Done,
    Failed,
    /// Only appears in run reports: the run halted or was cancelled first
    NotRun,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Running => "running",
            NodeStatus::Done => "done",
            NodeStatus::Failed => "failed",
            NodeStatus::NotRun => "not_run",
        };
        f.write_str(s)
    }
}
