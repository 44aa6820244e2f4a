use crate::filter::{image_layout, no_image};
use crate::raster::{channel, from_rgba, image_input, luma};
use async_trait::async_trait;
use image::RgbaImage;
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType};

/// Brightness and contrast as multiplicative factors, 1.0 is identity.
/// Alpha is left untouched.
#[derive(Default)]
pub struct BrightnessNode;

#[async_trait]
impl Node for BrightnessNode {
    fn node_type(&self) -> &str {
        "Brightness"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout()
            .input(
                PinSpec::new("brightness", PinType::Float)
                    .describe("Brightness factor")
                    .with_default(1.0),
            )
            .input(
                PinSpec::new("contrast", PinType::Float)
                    .describe("Contrast factor")
                    .with_default(1.0),
            )
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(mut image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let brightness = ctx.input_f64("brightness", 1.0)?.clamp(0.0, 3.0);
        let contrast = ctx.input_f64("contrast", 1.0)?.clamp(0.0, 3.0);

        if brightness != 1.0 {
            for pixel in image.pixels_mut() {
                for c in 0..3 {
                    pixel.0[c] = channel(pixel.0[c] as f64 * brightness);
                }
            }
        }
        if contrast != 1.0 {
            adjust_contrast(&mut image, contrast);
        }

        Ok(NodeOutput::new().fired().with_output("image", from_rgba(image)))
    }
}

/// Scale each channel's distance from the mean luminance
fn adjust_contrast(image: &mut RgbaImage, factor: f64) {
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    let mean = image.pixels().map(|p| luma(&p.0)).sum::<f64>() / count;

    for pixel in image.pixels_mut() {
        for c in 0..3 {
            pixel.0[c] = channel(mean + (pixel.0[c] as f64 - mean) * factor);
        }
    }
}

/// Saturation adjustment; 0.0 is grayscale, 1.0 is identity
#[derive(Default)]
pub struct HsvAdjustNode;

#[async_trait]
impl Node for HsvAdjustNode {
    fn node_type(&self) -> &str {
        "HsvAdjust"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout().input(
            PinSpec::new("saturation", PinType::Float)
                .describe("Saturation factor")
                .with_default(1.0),
        )
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(mut image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let saturation = ctx.input_f64("saturation", 1.0)?.clamp(0.0, 3.0);

        if saturation != 1.0 {
            for pixel in image.pixels_mut() {
                let gray = luma(&pixel.0);
                for c in 0..3 {
                    pixel.0[c] = channel(gray + (pixel.0[c] as f64 - gray) * saturation);
                }
            }
        }

        Ok(NodeOutput::new().fired().with_output("image", from_rgba(image)))
    }
}
