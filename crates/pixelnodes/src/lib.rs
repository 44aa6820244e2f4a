//! Standard node library
//!
//! Built-in node kinds for loading, processing and saving images, plus
//! variable sources.

mod color;
mod combine;
mod filter;
mod generator;
mod io;
mod raster;
mod transform;
mod variable;

pub use color::{BrightnessNode, HsvAdjustNode};
pub use combine::BlendNode;
pub use filter::{BlurNode, SharpenNode};
pub use generator::{NoiseNode, SolidColorNode};
pub use io::{ImageInfoNode, LoadImageNode, SaveImageNode};
pub use transform::{FlipNode, ResizeNode, RotateNode};
pub use variable::{
    BooleanVariableNode, FloatVariableNode, IntegerVariableNode, PathVariableNode,
    StringVariableNode,
};

use once_cell::sync::Lazy;
use pixelcore::{Node, NodeFactory, NodeMetadata, NodeRegistry};
use std::sync::Arc;

/// Factory for a built-in kind
#[derive(Clone, Copy)]
pub struct BuiltinFactory {
    kind: &'static str,
    display_name: &'static str,
    description: &'static str,
    category: &'static str,
    create: fn() -> Arc<dyn Node>,
}

fn instantiate<N: Node + Default + 'static>() -> Arc<dyn Node> {
    Arc::new(N::default())
}

impl NodeFactory for BuiltinFactory {
    fn create(&self) -> Arc<dyn Node> {
        (self.create)()
    }

    fn node_type(&self) -> &str {
        self.kind
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            display_name: self.display_name.to_string(),
            description: self.description.to_string(),
            category: self.category.to_string(),
        }
    }
}

const BUILTINS: &[BuiltinFactory] = &[
    BuiltinFactory {
        kind: "LoadImage",
        display_name: "Load Image",
        description: "Load an image from a file path",
        category: "Input/Output",
        create: instantiate::<LoadImageNode>,
    },
    BuiltinFactory {
        kind: "SaveImage",
        display_name: "Save Image",
        description: "Save an image to a file path",
        category: "Input/Output",
        create: instantiate::<SaveImageNode>,
    },
    BuiltinFactory {
        kind: "ImageInfo",
        display_name: "Image Info",
        description: "Get information about an image",
        category: "Input/Output",
        create: instantiate::<ImageInfoNode>,
    },
    BuiltinFactory {
        kind: "Blur",
        display_name: "Blur",
        description: "Apply Gaussian blur to an image",
        category: "Filter",
        create: instantiate::<BlurNode>,
    },
    BuiltinFactory {
        kind: "Sharpen",
        display_name: "Sharpen",
        description: "Sharpen an image",
        category: "Filter",
        create: instantiate::<SharpenNode>,
    },
    BuiltinFactory {
        kind: "Resize",
        display_name: "Resize",
        description: "Resize an image",
        category: "Transform",
        create: instantiate::<ResizeNode>,
    },
    BuiltinFactory {
        kind: "Rotate",
        display_name: "Rotate",
        description: "Rotate an image counter-clockwise by any angle",
        category: "Transform",
        create: instantiate::<RotateNode>,
    },
    BuiltinFactory {
        kind: "Flip",
        display_name: "Flip",
        description: "Flip an image",
        category: "Transform",
        create: instantiate::<FlipNode>,
    },
    BuiltinFactory {
        kind: "Brightness",
        display_name: "Brightness/Contrast",
        description: "Adjust brightness and contrast",
        category: "Color",
        create: instantiate::<BrightnessNode>,
    },
    BuiltinFactory {
        kind: "HsvAdjust",
        display_name: "HSV Adjust",
        description: "Adjust saturation",
        category: "Color",
        create: instantiate::<HsvAdjustNode>,
    },
    BuiltinFactory {
        kind: "SolidColor",
        display_name: "Solid Color",
        description: "Generate solid color image",
        category: "Generator",
        create: instantiate::<SolidColorNode>,
    },
    BuiltinFactory {
        kind: "Noise",
        display_name: "Noise",
        description: "Generate random noise",
        category: "Generator",
        create: instantiate::<NoiseNode>,
    },
    BuiltinFactory {
        kind: "Blend",
        display_name: "Blend",
        description: "Cross-fade two images",
        category: "Combine",
        create: instantiate::<BlendNode>,
    },
    BuiltinFactory {
        kind: "FloatVariable",
        display_name: "Float Variable",
        description: "Outputs a floating-point number value",
        category: "Variables",
        create: instantiate::<FloatVariableNode>,
    },
    BuiltinFactory {
        kind: "IntegerVariable",
        display_name: "Integer Variable",
        description: "Outputs an integer number value",
        category: "Variables",
        create: instantiate::<IntegerVariableNode>,
    },
    BuiltinFactory {
        kind: "BooleanVariable",
        display_name: "Boolean Variable",
        description: "Outputs a boolean value",
        category: "Variables",
        create: instantiate::<BooleanVariableNode>,
    },
    BuiltinFactory {
        kind: "StringVariable",
        display_name: "String Variable",
        description: "Outputs a string value",
        category: "Variables",
        create: instantiate::<StringVariableNode>,
    },
    BuiltinFactory {
        kind: "PathVariable",
        display_name: "Path Variable",
        description: "Outputs a file or directory path",
        category: "Variables",
        create: instantiate::<PathVariableNode>,
    },
];

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    for builtin in BUILTINS {
        registry.register(Arc::new(*builtin));
    }
}

static REGISTRY: Lazy<Arc<NodeRegistry>> = Lazy::new(|| {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    tracing::debug!(kinds = registry.len(), "built-in node registry initialised");
    Arc::new(registry)
});

/// Process-wide registry holding every built-in kind. Read-only once built.
pub fn registry() -> Arc<NodeRegistry> {
    REGISTRY.clone()
}
