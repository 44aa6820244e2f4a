use crate::events::EventEmitter;
use crate::pin::PinLayout;
use crate::{NodeError, NodeId, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Core trait that every node kind implements.
///
/// The engine only talks to nodes through this trait and never inspects
/// the concrete kind.
#[async_trait]
pub trait Node: Send + Sync {
    /// Kind identifier (e.g. "LoadImage", "FloatVariable")
    fn node_type(&self) -> &str;

    /// Pin layout, read once when the node is added to a graph
    fn declare_pins(&self) -> PinLayout;

    /// Process current input values into output values.
    ///
    /// Returning an error means no output of this node changes.
    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Everything a node sees while processing
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Input values by pin name, already pulled from upstream pins
    pub inputs: HashMap<String, Value>,

    /// Default values of this node's output pins, by pin name
    pub output_defaults: HashMap<String, Value>,

    /// Event emitter for progress and log messages
    pub events: EventEmitter,

    /// Cancellation of the surrounding run. The engine never interrupts a
    /// node, but long-running nodes may check this and bail out.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_id: NodeId, events: EventEmitter) -> Self {
        Self {
            node_id,
            inputs: HashMap::new(),
            output_defaults: HashMap::new(),
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Input value, `Null` when the pin is absent
    pub fn input(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.inputs.get(name).unwrap_or(&NULL)
    }

    /// Get a non-null input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        match self.inputs.get(name) {
            Some(v) if !v.is_null() => Ok(v),
            _ => Err(NodeError::MissingInput(name.to_string())),
        }
    }

    pub fn input_f64(&self, name: &str, default: f64) -> Result<f64, NodeError> {
        self.typed_input(name, "float", default, Value::as_f64)
    }

    pub fn input_i64(&self, name: &str, default: i64) -> Result<i64, NodeError> {
        self.typed_input(name, "int", default, Value::as_i64)
    }

    pub fn input_bool(&self, name: &str, default: bool) -> Result<bool, NodeError> {
        self.typed_input(name, "bool", default, Value::as_bool)
    }

    pub fn input_str(&self, name: &str) -> Result<Option<&str>, NodeError> {
        match self.input(name) {
            Value::Null => Ok(None),
            v => v
                .as_str()
                .map(Some)
                .ok_or_else(|| invalid_type(name, "string", v)),
        }
    }

    pub fn output_default(&self, name: &str) -> Value {
        self.output_defaults.get(name).cloned().unwrap_or_default()
    }

    fn typed_input<T>(
        &self,
        name: &str,
        expected: &str,
        default: T,
        view: fn(&Value) -> Option<T>,
    ) -> Result<T, NodeError> {
        match self.input(name) {
            Value::Null => Ok(default),
            v => view(v).ok_or_else(|| invalid_type(name, expected, v)),
        }
    }
}

fn invalid_type(field: &str, expected: &str, actual: &Value) -> NodeError {
    NodeError::InvalidInputType {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// Output from node processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output pin values by name; pins not listed keep their value
    pub outputs: HashMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }

    /// Marks the `exec` output as fired
    pub fn fired(self) -> Self {
        self.with_output("exec", true)
    }

    pub fn get(&self, port: &str) -> Option<&Value> {
        self.outputs.get(port)
    }
}

/// Descriptive metadata of a node kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub display_name: String,
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            description: String::new(),
            category: "General".to_string(),
        }
    }
}
