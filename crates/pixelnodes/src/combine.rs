use crate::raster::{from_rgba, image_input, mix};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType, Value};

/// Cross-fade `a` into `b`. `b` is resized to `a`'s dimensions first; a
/// single connected image passes through unchanged.
#[derive(Default)]
pub struct BlendNode;

#[async_trait]
impl Node for BlendNode {
    fn node_type(&self) -> &str {
        "Blend"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::flow()
            .input(PinSpec::new("a", PinType::Image))
            .input(PinSpec::new("b", PinType::Image))
            .input(
                PinSpec::new("factor", PinType::Float)
                    .describe("0.0 keeps a, 1.0 gives b")
                    .with_default(0.5),
            )
            .output(PinSpec::new("image", PinType::Image))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let factor = ctx.input_f64("factor", 0.5)?.clamp(0.0, 1.0);

        let blended = match (image_input(&ctx, "a")?, image_input(&ctx, "b")?) {
            (Some(a), Some(b)) => {
                let b = if a.dimensions() == b.dimensions() {
                    b
                } else {
                    imageops::resize(&b, a.width(), a.height(), FilterType::Triangle)
                };
                Value::Image(from_rgba(mix(&a, &b, factor)))
            }
            (Some(only), None) | (None, Some(only)) => Value::Image(from_rgba(only)),
            (None, None) => Value::Null,
        };

        Ok(NodeOutput::new().fired().with_output("image", blended))
    }
}
