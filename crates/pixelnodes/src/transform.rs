use crate::filter::{image_layout, no_image};
use crate::raster::{dimension, from_rgba, image_input, MAX_DIMENSION};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType};

#[derive(Default)]
pub struct ResizeNode;

#[async_trait]
impl Node for ResizeNode {
    fn node_type(&self) -> &str {
        "Resize"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout()
            .input(PinSpec::new("width", PinType::Int).describe("Target width").with_default(800i64))
            .input(PinSpec::new("height", PinType::Int).describe("Target height").with_default(600i64))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let width = dimension(&ctx, "width", 800)?;
        let height = dimension(&ctx, "height", 600)?;

        let resized = imageops::resize(&image, width, height, FilterType::Lanczos3);
        Ok(NodeOutput::new().fired().with_output("image", from_rgba(resized)))
    }
}

/// Counter-clockwise rotation by any angle. The canvas grows to fit the
/// rotated image and uncovered corners are filled with white.
#[derive(Default)]
pub struct RotateNode;

const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[async_trait]
impl Node for RotateNode {
    fn node_type(&self) -> &str {
        "Rotate"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout().input(
            PinSpec::new("angle", PinType::Float)
                .describe("Rotation angle in degrees, counter-clockwise")
                .with_default(0.0),
        )
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };
        let angle = ctx.input_f64("angle", 0.0)?;
        if !angle.is_finite() {
            return Err(NodeError::ExecutionFailed(format!("invalid angle: {}", angle)));
        }

        let turns = angle / 90.0;
        let rotated = if (turns - turns.round()).abs() < 1e-9 {
            // imageops rotates clockwise
            match (turns.round() as i64).rem_euclid(4) {
                1 => imageops::rotate270(&image),
                2 => imageops::rotate180(&image),
                3 => imageops::rotate90(&image),
                _ => image,
            }
        } else {
            rotate_expanded(&image, angle)
        };
        Ok(NodeOutput::new().fired().with_output("image", from_rgba(rotated)))
    }
}

fn rotate_expanded(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (image.width() as f64, image.height() as f64);
    let fit = |extent: f64| (extent - 1e-6).ceil().clamp(1.0, MAX_DIMENSION as f64) as u32;
    let (width, height) = (fit(w * cos + h * sin), fit(w * sin + h * cos));

    let mut canvas = RgbaImage::from_pixel(width, height, FILL);
    let dx = (width as i64 - image.width() as i64) / 2;
    let dy = (height as i64 - image.height() as i64) / 2;
    imageops::replace(&mut canvas, image, dx, dy);

    // rotate_about_center turns clockwise
    rotate_about_center(&canvas, -theta as f32, Interpolation::Bilinear, FILL)
}

#[derive(Default)]
pub struct FlipNode;

#[async_trait]
impl Node for FlipNode {
    fn node_type(&self) -> &str {
        "Flip"
    }

    fn declare_pins(&self) -> PinLayout {
        image_layout()
            .input(PinSpec::new("horizontal", PinType::Bool).with_default(false))
            .input(PinSpec::new("vertical", PinType::Bool).with_default(false))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let Some(mut image) = image_input(&ctx, "image")? else {
            return Ok(no_image());
        };

        if ctx.input_bool("horizontal", false)? {
            imageops::flip_horizontal_in_place(&mut image);
        }
        if ctx.input_bool("vertical", false)? {
            imageops::flip_vertical_in_place(&mut image);
        }

        Ok(NodeOutput::new().fired().with_output("image", from_rgba(image)))
    }
}
