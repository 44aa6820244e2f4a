use crate::raster::dimension;
use async_trait::async_trait;
use pixelcore::{ImageData, Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generator_layout() -> PinLayout {
    PinLayout::flow()
        .input(PinSpec::new("width", PinType::Int).describe("Image width").with_default(512i64))
        .input(PinSpec::new("height", PinType::Int).describe("Image height").with_default(512i64))
        .output(PinSpec::new("image", PinType::Image).describe("Generated image"))
}

fn component(ctx: &NodeContext, name: &str) -> Result<u8, NodeError> {
    Ok(ctx.input_i64(name, 255)?.clamp(0, 255) as u8)
}

#[derive(Default)]
pub struct SolidColorNode;

#[async_trait]
impl Node for SolidColorNode {
    fn node_type(&self) -> &str {
        "SolidColor"
    }

    fn declare_pins(&self) -> PinLayout {
        generator_layout()
            .input(PinSpec::new("red", PinType::Int).describe("Red component (0-255)").with_default(255i64))
            .input(PinSpec::new("green", PinType::Int).describe("Green component (0-255)").with_default(255i64))
            .input(PinSpec::new("blue", PinType::Int).describe("Blue component (0-255)").with_default(255i64))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let width = dimension(&ctx, "width", 512)?;
        let height = dimension(&ctx, "height", 512)?;
        let rgba = [
            component(&ctx, "red")?,
            component(&ctx, "green")?,
            component(&ctx, "blue")?,
            255,
        ];

        Ok(NodeOutput::new()
            .fired()
            .with_output("image", ImageData::filled(width, height, rgba)))
    }
}

/// Opaque RGB noise, reproducible for a given seed
#[derive(Default)]
pub struct NoiseNode;

#[async_trait]
impl Node for NoiseNode {
    fn node_type(&self) -> &str {
        "Noise"
    }

    fn declare_pins(&self) -> PinLayout {
        generator_layout().input(PinSpec::new("seed", PinType::Int).describe("Random seed").with_default(42i64))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let width = dimension(&ctx, "width", 512)?;
        let height = dimension(&ctx, "height", 512)?;
        let seed = ctx.input_i64("seed", 42)?;

        let mut rng = StdRng::seed_from_u64(seed as u64);
        let mut pixels = vec![255u8; width as usize * height as usize * 4];
        for pixel in pixels.chunks_exact_mut(4) {
            pixel[0] = rng.random();
            pixel[1] = rng.random();
            pixel[2] = rng.random();
        }

        Ok(NodeOutput::new().fired().with_output(
            "image",
            ImageData {
                width,
                height,
                pixels,
            },
        ))
    }
}
