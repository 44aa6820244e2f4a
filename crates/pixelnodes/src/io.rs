use crate::raster::{from_rgba, image_error, image_input};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use pixelcore::{Node, NodeContext, NodeError, NodeOutput, PinLayout, PinSpec, PinType, Value};
use std::path::{Path, PathBuf};

/// Decode an image file into an RGBA buffer
#[derive(Default)]
pub struct LoadImageNode;

#[async_trait]
impl Node for LoadImageNode {
    fn node_type(&self) -> &str {
        "LoadImage"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::flow()
            .input(
                PinSpec::new("path", PinType::Path)
                    .describe("File path to image")
                    .with_default(Value::Path(String::new())),
            )
            .output(PinSpec::new("image", PinType::Image).describe("Loaded image"))
            .output(PinSpec::new("width", PinType::Int).describe("Image width"))
            .output(PinSpec::new("height", PinType::Int).describe("Image height"))
            .output(PinSpec::new("filename", PinType::String).describe("Filename without path"))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let path = ctx.input_str("path")?.unwrap_or_default().trim().to_string();
        if path.is_empty() {
            tracing::warn!(node_id = %ctx.node_id, "no file path given to LoadImage");
            ctx.events.warn("No file path provided");
            return Ok(NodeOutput::new()
                .fired()
                .with_output("image", Value::Null)
                .with_output("width", Value::Null)
                .with_output("height", Value::Null)
                .with_output("filename", Value::Null));
        }

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| NodeError::Io(format!("{}: {}", path, e)))?;
        if !meta.is_file() {
            return Err(NodeError::ExecutionFailed(format!("path is not a file: {}", path)));
        }
        ctx.events.progress(20.0, None);

        let source = PathBuf::from(&path);
        let decoded = tokio::task::spawn_blocking(move || image::open(source))
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("decoder task failed: {}", e)))?
            .map_err(image_error)?;
        let image = from_rgba(decoded.to_rgba8());
        ctx.events.progress(80.0, None);

        let filename = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(path = %path, width = image.width, height = image.height, "image loaded");
        Ok(NodeOutput::new()
            .fired()
            .with_output("width", image.width)
            .with_output("height", image.height)
            .with_output("filename", filename)
            .with_output("image", image))
    }
}

/// Encode an image to disk. Reports `success = false` instead of failing
/// when there is nothing to save.
#[derive(Default)]
pub struct SaveImageNode;

#[async_trait]
impl Node for SaveImageNode {
    fn node_type(&self) -> &str {
        "SaveImage"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::flow()
            .input(PinSpec::new("image", PinType::Image).describe("Image to save"))
            .input(
                PinSpec::new("path", PinType::Path)
                    .describe("File path to save to")
                    .with_default(Value::Path("output.png".to_string())),
            )
            .input(
                PinSpec::new("format", PinType::String)
                    .describe("PNG, JPEG or BMP; empty infers from the extension")
                    .with_default(""),
            )
            .input(
                PinSpec::new("quality", PinType::Int)
                    .describe("JPEG quality (1-100)")
                    .with_default(95i64),
            )
            .output(PinSpec::new("success", PinType::Bool).describe("True if saved"))
            .output(PinSpec::new("saved_path", PinType::Path).describe("Where the file was written"))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let not_saved = || {
            NodeOutput::new()
                .fired()
                .with_output("success", false)
                .with_output("saved_path", Value::Path(String::new()))
        };

        let Some(image) = image_input(&ctx, "image")? else {
            tracing::warn!(node_id = %ctx.node_id, "no image given to SaveImage");
            return Ok(not_saved());
        };
        let path = ctx.input_str("path")?.unwrap_or_default().trim().to_string();
        if path.is_empty() {
            tracing::warn!(node_id = %ctx.node_id, "no file path given to SaveImage");
            return Ok(not_saved());
        }

        let target = PathBuf::from(&path);
        let format = resolve_format(ctx.input_str("format")?.unwrap_or_default(), &target)?;
        let quality = ctx.input_i64("quality", 95)?.clamp(1, 100) as u8;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        ctx.events.progress(50.0, None);

        let destination = target.clone();
        tokio::task::spawn_blocking(move || encode(image, &destination, format, quality))
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("encoder task failed: {}", e)))??;

        tracing::info!(path = %path, format = ?format, "image saved");
        Ok(NodeOutput::new()
            .fired()
            .with_output("success", true)
            .with_output("saved_path", Value::Path(path)))
    }
}

fn resolve_format(requested: &str, path: &Path) -> Result<ImageFormat, NodeError> {
    let requested = requested.trim();
    let format = if requested.is_empty() {
        ImageFormat::from_path(path).unwrap_or(ImageFormat::Png)
    } else {
        ImageFormat::from_extension(requested.to_ascii_lowercase()).ok_or_else(|| {
            NodeError::ExecutionFailed(format!("unknown image format: {}", requested))
        })?
    };

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp => Ok(format),
        other => Err(NodeError::ExecutionFailed(format!(
            "unsupported image format: {:?}",
            other
        ))),
    }
}

fn encode(image: RgbaImage, path: &Path, format: ImageFormat, quality: u8) -> Result<(), NodeError> {
    if format == ImageFormat::Jpeg {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality)
            .encode_image(&rgb)
            .map_err(image_error)
    } else {
        image.save_with_format(path, format).map_err(image_error)
    }
}

#[derive(Default)]
pub struct ImageInfoNode;

#[async_trait]
impl Node for ImageInfoNode {
    fn node_type(&self) -> &str {
        "ImageInfo"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::flow()
            .input(PinSpec::new("image", PinType::Image).describe("Input image"))
            .output(PinSpec::new("width", PinType::Int))
            .output(PinSpec::new("height", PinType::Int))
            .output(PinSpec::new("mode", PinType::String))
            .output(PinSpec::new("channels", PinType::Int))
            .output(PinSpec::new("aspect_ratio", PinType::Float).describe("Width/height ratio"))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let output = NodeOutput::new().fired();
        let Some(image) = image_input(&ctx, "image")? else {
            return Ok(output
                .with_output("width", Value::Null)
                .with_output("height", Value::Null)
                .with_output("mode", Value::Null)
                .with_output("channels", Value::Null)
                .with_output("aspect_ratio", Value::Null));
        };

        let (width, height) = image.dimensions();
        let aspect_ratio = if height > 0 {
            width as f64 / height as f64
        } else {
            0.0
        };

        Ok(output
            .with_output("width", width)
            .with_output("height", height)
            .with_output("mode", "RGBA")
            .with_output("channels", 4i64)
            .with_output("aspect_ratio", aspect_ratio))
    }
}
