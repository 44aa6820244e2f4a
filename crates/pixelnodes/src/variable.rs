//! Variable sources. Each has no inputs and a single fan-out output whose
//! default value is the variable's content; editors change the value with
//! `Graph::set_pin_default` on that output pin.

use async_trait::async_trait;
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType, Value};

fn variable_layout(name: &str, pin_type: PinType, default: Value, description: &str) -> PinLayout {
    PinLayout::new().output(
        PinSpec::new(name, pin_type)
            .describe(description)
            .with_default(default)
            .multiple(),
    )
}

fn emit(ctx: &NodeContext, name: &str) -> NodeOutput {
    NodeOutput::new().with_output(name, ctx.output_default(name))
}

#[derive(Default)]
pub struct FloatVariableNode;

#[async_trait]
impl Node for FloatVariableNode {
    fn node_type(&self) -> &str {
        "FloatVariable"
    }

    fn declare_pins(&self) -> PinLayout {
        variable_layout("value", PinType::Float, Value::Float(0.0), "Float value output")
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(emit(&ctx, "value"))
    }
}

#[derive(Default)]
pub struct IntegerVariableNode;

#[async_trait]
impl Node for IntegerVariableNode {
    fn node_type(&self) -> &str {
        "IntegerVariable"
    }

    fn declare_pins(&self) -> PinLayout {
        variable_layout("value", PinType::Int, Value::Int(0), "Integer value output")
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(emit(&ctx, "value"))
    }
}

#[derive(Default)]
pub struct BooleanVariableNode;

#[async_trait]
impl Node for BooleanVariableNode {
    fn node_type(&self) -> &str {
        "BooleanVariable"
    }

    fn declare_pins(&self) -> PinLayout {
        variable_layout("value", PinType::Bool, Value::Bool(false), "Boolean value output")
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(emit(&ctx, "value"))
    }
}

#[derive(Default)]
pub struct StringVariableNode;

#[async_trait]
impl Node for StringVariableNode {
    fn node_type(&self) -> &str {
        "StringVariable"
    }

    fn declare_pins(&self) -> PinLayout {
        variable_layout("value", PinType::String, Value::String(String::new()), "String value output")
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(emit(&ctx, "value"))
    }
}

#[derive(Default)]
pub struct PathVariableNode;

#[async_trait]
impl Node for PathVariableNode {
    fn node_type(&self) -> &str {
        "PathVariable"
    }

    fn declare_pins(&self) -> PinLayout {
        variable_layout("path", PinType::Path, Value::Path(String::new()), "File or directory path")
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(emit(&ctx, "path"))
    }
}
