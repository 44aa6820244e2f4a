use crate::error::{ConnectRejection, PinDescriptor};
use crate::types::{compatible, ConnectionId, NodeId, PinDirection, PinId, PinType};
use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Declaration of a pin, as returned by `Node::declare_pins`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinSpec {
    pub name: String,
    pub pin_type: PinType,
    pub description: String,
    pub default_value: Value,
    /// `None` picks the direction default: outputs fan out, inputs take one wire
    pub is_multiple: Option<bool>,
}

impl PinSpec {
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            description: String::new(),
            default_value: Value::Null,
            is_multiple: None,
        }
    }

    /// Execution-flow pin named `exec`
    pub fn exec() -> Self {
        Self::new("exec", PinType::Exec)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn multiple(mut self) -> Self {
        self.is_multiple = Some(true);
        self
    }

    pub fn single(mut self) -> Self {
        self.is_multiple = Some(false);
        self
    }
}

/// Ordered input and output pin declarations of a node kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinLayout {
    pub inputs: Vec<PinSpec>,
    pub outputs: Vec<PinSpec>,
}

impl PinLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout pre-populated with an `exec` input and an `exec` output
    pub fn flow() -> Self {
        Self::new().input(PinSpec::exec()).output(PinSpec::exec())
    }

    pub fn input(mut self, spec: PinSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn output(mut self, spec: PinSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    /// Name of the first pin declared twice on the same side, if any
    pub fn duplicate_name(&self) -> Option<&str> {
        for side in [&self.inputs, &self.outputs] {
            let mut seen = BTreeSet::new();
            for spec in side {
                if !seen.insert(spec.name.as_str()) {
                    return Some(spec.name.as_str());
                }
            }
        }
        None
    }
}

/// A typed port owned by exactly one node
#[derive(Debug, Clone)]
pub struct Pin {
    id: PinId,
    node_id: NodeId,
    name: String,
    description: String,
    pin_type: PinType,
    direction: PinDirection,
    value: Value,
    default_value: Value,
    is_multiple: bool,
    connections: BTreeSet<ConnectionId>,
}

impl Pin {
    pub fn from_spec(node_id: NodeId, direction: PinDirection, spec: PinSpec) -> Self {
        let is_multiple = spec
            .is_multiple
            .unwrap_or(direction == PinDirection::Output);
        Self {
            id: Uuid::new_v4(),
            node_id,
            name: spec.name,
            description: spec.description,
            pin_type: spec.pin_type,
            direction,
            value: spec.default_value.clone(),
            default_value: spec.default_value,
            is_multiple,
            connections: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> PinId {
        self.id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pin_type(&self) -> PinType {
        self.pin_type
    }

    pub fn direction(&self) -> PinDirection {
        self.direction
    }

    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PinDirection::Output
    }

    pub fn is_multiple(&self) -> bool {
        self.is_multiple
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Connection ids attached to this pin, in id order
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn has_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }

    /// Basic compatibility only. Occupancy is the graph's concern, since
    /// connecting to an occupied single pin replaces the old wire.
    pub fn can_accept_connection(&self, other: &Pin) -> bool {
        self.check_connection(other).is_ok()
    }

    pub fn check_connection(&self, other: &Pin) -> Result<(), ConnectRejection> {
        if self.id == other.id {
            return Err(ConnectRejection::SamePin);
        }
        if self.direction == other.direction {
            return Err(ConnectRejection::SameDirection);
        }
        let (output, input) = if self.is_output() {
            (self.pin_type, other.pin_type)
        } else {
            (other.pin_type, self.pin_type)
        };
        if !compatible(output, input) {
            return Err(ConnectRejection::TypeMismatch);
        }
        Ok(())
    }

    /// Store a new current value. Does not notify anyone; propagation is
    /// driven by the execution engine.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub fn set_default_value(&mut self, value: Value) {
        self.default_value = value;
    }

    pub fn attach(&mut self, connection: ConnectionId) {
        self.connections.insert(connection);
    }

    pub fn detach(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    pub fn descriptor(&self) -> PinDescriptor {
        PinDescriptor {
            pin_id: self.id,
            node_id: self.node_id,
            name: self.name.clone(),
            pin_type: self.pin_type,
            direction: self.direction,
        }
    }

    /// Restores values from a snapshot record.
    pub(crate) fn restore(&mut self, value: Value, default_value: Value) {
        self.value = value;
        self.default_value = default_value;
    }
}
