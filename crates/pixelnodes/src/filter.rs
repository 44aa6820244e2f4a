use crate::raster::{from_rgba, image_input, mix};
use async_trait::async_trait;
use image::imageops;
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType, Value};

/// Layout shared by every single-image node: flow pins, `image` in and out
pub(crate) fn image_layout() -> PinLayout {
    PinLayout::flow()
        .input(PinSpec::new("image", PinType::Image).describe("Input image"))
        .output(PinSpec::new("image", PinType::Image))
}

/// Output for an image node that had nothing to work on
pub(crate) fn no_image() -> NodeOutput {
    NodeOutput::new().fired().with_output("image", Value::Null)
}

/// Gaussian blur
#[derive(Default)]
pub struct BlurNode;

#[async_trait]
impl Node for BlurNode {
    fn node_type(&self) -> &str {
        "Blur"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout().input(
            PinSpec::new("radius", PinType::Float)
                .describe("Blur radius")
                .with_default(2.0),
        )
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let radius = ctx.input_f64("radius", 2.0)?.clamp(0.0, 50.0);

        let result = if radius > 0.0 {
            imageops::blur(&image, radius as f32)
        } else {
            image
        };

        Ok(NodeOutput::new().fired().with_output("image", from_rgba(result)))
    }
}

#[derive(Default)]
pub struct SharpenNode;

#[async_trait]
impl Node for SharpenNode {
    fn node_type(&self) -> &str {
        "Sharpen"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout().input(
            PinSpec::new("strength", PinType::Float)
                .describe("Sharpen strength")
                .with_default(1.0),
        )
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let strength = ctx.input_f64("strength", 1.0)?.clamp(0.0, 5.0);

        // Below 1.0 the sharpened image is blended back with the original.
        let result = if strength == 0.0 {
            image
        } else {
            let sharpened = imageops::unsharpen(&image, 1.0, 0);
            if strength >= 1.0 {
                sharpened
            } else {
                mix(&image, &sharpened, strength)
            }
        };

        Ok(NodeOutput::new().fired().with_output("image", from_rgba(result)))
    }
}
