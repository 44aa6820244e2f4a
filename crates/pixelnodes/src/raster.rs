//! Conversions between pixel buffers carried on pins and `image` buffers,
//! plus the small pixel operations the color and combine nodes share.

use image::{ImageError, RgbaImage};
use pixelcore::{ImageData, NodeContext, NodeError, Value};

/// Upper bound on generated and resized dimensions
pub(crate) const MAX_DIMENSION: i64 = 16_384;

pub(crate) fn to_rgba(data: &ImageData) -> Result<RgbaImage, NodeError> {
    RgbaImage::from_raw(data.width, data.height, data.pixels.clone()).ok_or_else(|| {
        NodeError::ExecutionFailed(format!(
            "pixel buffer does not match {}x{}",
            data.width, data.height
        ))
    })
}

pub(crate) fn from_rgba(image: RgbaImage) -> ImageData {
    ImageData {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    }
}

/// Image on pin `name`, `None` when nothing arrived
pub(crate) fn image_input(ctx: &NodeContext, name: &str) -> Result<Option<RgbaImage>, NodeError> {
    match ctx.input(name) {
        Value::Null => Ok(None),
        Value::Image(data) => to_rgba(data).map(Some),
        other => Err(NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "image".to_string(),
            actual: other.type_name().to_string(),
        }),
    }
}

pub(crate) fn dimension(ctx: &NodeContext, name: &str, default: i64) -> Result<u32, NodeError> {
    let value = ctx.input_i64(name, default)?.clamp(1, MAX_DIMENSION);
    Ok(value as u32)
}

pub(crate) fn image_error(e: ImageError) -> NodeError {
    match e {
        ImageError::IoError(io) => io.into(),
        other => NodeError::ExecutionFailed(other.to_string()),
    }
}

pub(crate) fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

pub(crate) fn luma(pixel: &[u8]) -> f64 {
    0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64
}

/// Linear interpolation `a + (b - a) * t` over every channel. Both images
/// must have the same dimensions.
pub(crate) fn mix(a: &RgbaImage, b: &RgbaImage, t: f64) -> RgbaImage {
    let mut out = a.clone();
    for (dst, (pa, pb)) in out.pixels_mut().zip(a.pixels().zip(b.pixels())) {
        for c in 0..4 {
            let (x, y) = (pa.0[c] as f64, pb.0[c] as f64);
            dst.0[c] = channel(x + (y - x) * t);
        }
    }
    out
}
