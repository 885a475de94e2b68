/// TextureCache - GPU residency and descriptor slots for images.
///
/// Keyed by image identity, first-seen-wins. A miss creates the texture,
/// enqueues the pixel upload and claims a stable slot in the texture
/// partition of the descriptor table. Entries are never evicted.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, ResidencyState, TextureFormat};
use crate::gpu::command_recorder::CommandRecorder;
use crate::gpu::descriptor_table::{DescriptorPartition, DescriptorTable};
use crate::gpu::resource::{GpuResource, UploadState};
use crate::gpu::uploader::Uploader;
use crate::resource::image::Image;

/// One resident texture: its GPU resource and its descriptor slot
pub struct TextureResidency {
    pub resource: Arc<GpuResource>,
    pub slot: u32,
}

impl TextureResidency {
    /// Whether shaders may sample this texture this frame
    pub fn is_drawable(&self) -> bool {
        self.resource.is_drawable()
    }
}

/// Image identity -> resident texture. Entries are never evicted.
pub struct TextureCache {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    entries: FxHashMap<u64, Arc<TextureResidency>>,
}

impl TextureCache {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            entries: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, image_id: u64) -> Option<&Arc<TextureResidency>> {
        self.entries.get(&image_id)
    }

    /// Fetch or create the resident texture for an image.
    ///
    /// The descriptor slot is written immediately (views are valid before
    /// the contents are); sampling is gated by `is_drawable`, which flips
    /// only after upload and the shader-readable transition have executed.
    pub fn get_or_create(
        &mut self,
        image: &Arc<Image>,
        uploader: &mut Uploader,
        descriptors: &mut DescriptorTable,
    ) -> Result<Arc<TextureResidency>> {
        if let Some(residency) = self.entries.get(&image.id()) {
            return Ok(residency.clone());
        }

        let resource = GpuResource::sampled_texture(
            &self.device,
            image.width(),
            image.height(),
            TextureFormat::R8G8B8A8_UNORM,
        )?;
        uploader.enqueue_upload(resource.clone(), image.pixels().clone(), 4);

        let slot = descriptors.get_or_create_slot(DescriptorPartition::Texture, image.id())?;
        descriptors.write_texture(slot, &resource)?;

        let residency = Arc::new(TextureResidency { resource, slot });
        self.entries.insert(image.id(), residency.clone());
        Ok(residency)
    }

    /// Record shader-readable transitions for textures whose upload has
    /// completed but which still sit in `CopyDestination`.
    pub fn record_pending_transitions(&self, recorder: &mut CommandRecorder) -> Result<()> {
        for residency in self.entries.values() {
            if residency.resource.upload_state() == UploadState::Uploaded
                && residency.resource.residency_state() == ResidencyState::CopyDestination
            {
                residency
                    .resource
                    .enqueue_transition(recorder, ResidencyState::ShaderReadable)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "texture_cache_tests.rs"]
mod tests;
