/// Image resource - a decoded RGBA8 pixel buffer.

use std::sync::Arc;

use crate::error::Result;
use crate::render_bail;
use crate::resource::next_entity_id;

/// Decoded image data, 4 bytes per pixel, row-major
pub struct Image {
    id: u64,
    name: String,
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Image {
    /// Create an image from decoded RGBA8 pixels.
    ///
    /// The pixel buffer length must be exactly `width * height * 4`.
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            render_bail!(
                "orrery3d::Image",
                "image '{}': {} pixel bytes, expected {} for {}x{} RGBA8",
                name,
                pixels.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            id: next_entity_id(),
            name,
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Identity id, the cache key for texture residency and descriptor slots
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Shared pixel bytes; upload commands hold a second reference
    pub fn pixels(&self) -> &Arc<[u8]> {
        &self.pixels
    }
}
