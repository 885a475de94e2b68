/// Material resource - visual description of a surface.
///
/// Pure data, no GPU objects: a named shader reference (resolved through the
/// ShaderRegistry and therefore hot-reloadable), an alpha mode and an
/// optional color image. The MaterialBindingCache compiles this into a
/// pipeline lazily.

use std::sync::Arc;

use crate::graphics_device::BlendMode;
use crate::resource::image::Image;
use crate::resource::next_entity_id;

/// How the material's alpha channel is interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    /// Alpha ignored
    Opaque,
    /// Discard fragments below the cutoff
    Mask { cutoff: f32 },
    /// Alpha blending
    Blend,
}

impl AlphaMode {
    /// Fixed-function blend state this mode compiles to
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            AlphaMode::Opaque | AlphaMode::Mask { .. } => BlendMode::Opaque,
            AlphaMode::Blend => BlendMode::Alpha,
        }
    }
}

/// Surface description referencing a hot-reloadable shader
pub struct Material {
    id: u64,
    name: String,
    shader: String,
    alpha_mode: AlphaMode,
    base_color: [f32; 4],
    color_image: Option<Arc<Image>>,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: impl Into<String>) -> Self {
        Self {
            id: next_entity_id(),
            name: name.into(),
            shader: shader.into(),
            alpha_mode: AlphaMode::Opaque,
            base_color: [1.0, 1.0, 1.0, 1.0],
            color_image: None,
        }
    }

    pub fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    pub fn with_base_color(mut self, base_color: [f32; 4]) -> Self {
        self.base_color = base_color;
        self
    }

    pub fn with_color_image(mut self, image: Arc<Image>) -> Self {
        self.color_image = Some(image);
        self
    }

    /// Identity id, the cache key for compiled pipelines and slots
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the shader in the ShaderRegistry
    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha_mode
    }

    pub fn base_color(&self) -> [f32; 4] {
        self.base_color
    }

    pub fn color_image(&self) -> Option<&Arc<Image>> {
        self.color_image.as_ref()
    }
}
