/// GpuResource - one GPU-visible allocation with an explicit state machine.
///
/// Wraps a device buffer or texture together with its residency state and
/// upload status. Residency transitions are recorded as barriers immediately
/// but the logical state field only mutates once the GPU has executed the
/// submission, through a completion callback registered on the recorder.
/// `is_drawable` therefore always reflects what the GPU has actually
/// finished, never an optimistic record-time value.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, BufferUsage, DeviceBuffer, DeviceTexture, GraphicsDevice, MemoryLocation,
    ResidencyState, TextureDesc, TextureFormat, TextureUsage,
};
use crate::gpu::command_recorder::CommandRecorder;

/// Upload status of a resource. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadState {
    /// No upload requested
    None,
    /// Sitting in the uploader's FIFO or in flight
    Enqueued,
    /// GPU-side contents are valid
    Uploaded,
}

/// The wrapped device allocation
pub enum ResourcePayload {
    Buffer(Arc<dyn DeviceBuffer>),
    Texture(Arc<dyn DeviceTexture>),
}

struct StateFields {
    residency: ResidencyState,
    upload: UploadState,
}

/// One GPU-visible allocation (buffer or image)
pub struct GpuResource {
    payload: ResourcePayload,
    byte_len: u64,
    stride: u32,
    state: Mutex<StateFields>,
}

impl GpuResource {
    /// Create a device-local buffer in `CopyDestination`/`None`.
    ///
    /// Reached only through staged copies; drawable after an upload
    /// completes and a transition to its bind state has executed.
    pub fn device_local_buffer(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        byte_len: u64,
        stride: u32,
        usage: BufferUsage,
    ) -> Result<Arc<Self>> {
        let buffer = device.lock().unwrap().create_buffer(BufferDesc {
            size: byte_len,
            usage: usage | BufferUsage::TRANSFER_DST,
            location: MemoryLocation::DeviceLocal,
        })?;
        Ok(Arc::new(Self {
            payload: ResourcePayload::Buffer(buffer),
            byte_len,
            stride,
            state: Mutex::new(StateFields {
                residency: ResidencyState::CopyDestination,
                upload: UploadState::None,
            }),
        }))
    }

    /// Create a host-visible buffer in `HostVisible`/`None`.
    ///
    /// Written through the blocking `map_copy_unmap` path; never
    /// transitions.
    pub fn host_visible_buffer(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        byte_len: u64,
        stride: u32,
        usage: BufferUsage,
    ) -> Result<Arc<Self>> {
        let buffer = device.lock().unwrap().create_buffer(BufferDesc {
            size: byte_len,
            usage,
            location: MemoryLocation::HostVisible,
        })?;
        Ok(Arc::new(Self {
            payload: ResourcePayload::Buffer(buffer),
            byte_len,
            stride,
            state: Mutex::new(StateFields {
                residency: ResidencyState::HostVisible,
                upload: UploadState::None,
            }),
        }))
    }

    /// Create a sampled texture in `CopyDestination`/`None`
    pub fn sampled_texture(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Arc<Self>> {
        let texture = device.lock().unwrap().create_texture(TextureDesc {
            width,
            height,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
        })?;
        let byte_len = width as u64 * height as u64 * format.bytes_per_pixel() as u64;
        Ok(Arc::new(Self {
            payload: ResourcePayload::Texture(texture),
            byte_len,
            stride: format.bytes_per_pixel() * width,
            state: Mutex::new(StateFields {
                residency: ResidencyState::CopyDestination,
                upload: UploadState::None,
            }),
        }))
    }

    // ===== ACCESSORS =====

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Element stride in bytes
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Number of elements (byte length / stride)
    pub fn element_count(&self) -> u64 {
        if self.stride == 0 {
            0
        } else {
            self.byte_len / self.stride as u64
        }
    }

    /// The wrapped device allocation
    pub fn payload(&self) -> &ResourcePayload {
        &self.payload
    }

    /// The wrapped device buffer, if this resource is a buffer
    pub fn buffer(&self) -> Option<&Arc<dyn DeviceBuffer>> {
        match &self.payload {
            ResourcePayload::Buffer(buffer) => Some(buffer),
            ResourcePayload::Texture(_) => None,
        }
    }

    /// The wrapped device texture, if this resource is a texture
    pub fn texture(&self) -> Option<&Arc<dyn DeviceTexture>> {
        match &self.payload {
            ResourcePayload::Buffer(_) => None,
            ResourcePayload::Texture(texture) => Some(texture),
        }
    }

    // ===== STATE MACHINE =====

    pub fn residency_state(&self) -> ResidencyState {
        self.state.lock().unwrap().residency
    }

    pub fn upload_state(&self) -> UploadState {
        self.state.lock().unwrap().upload
    }

    /// Whether draw commands may reference this resource this frame.
    ///
    /// True exactly when the contents have finished uploading and the
    /// resource occupies a bindable residency state.
    pub fn is_drawable(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.upload == UploadState::Uploaded
            && matches!(
                state.residency,
                ResidencyState::VertexBuffer
                    | ResidencyState::IndexBuffer
                    | ResidencyState::ShaderReadable
                    | ResidencyState::HostVisible
            )
    }

    /// Advance the upload status. Never moves backwards.
    pub(crate) fn set_upload_state(&self, next: UploadState) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(
            next >= state.upload,
            "upload state moving backwards: {:?} -> {:?}",
            state.upload,
            next
        );
        if next > state.upload {
            state.upload = next;
        }
    }

    fn set_residency_state(&self, next: ResidencyState) {
        self.state.lock().unwrap().residency = next;
    }

    /// Record a residency transition and defer the logical state change.
    ///
    /// The barrier goes into the recorder immediately; the `residencyState`
    /// field is only mutated by a completion callback once the submission
    /// carrying the barrier has finished on the GPU. The callback holds a
    /// weak reference and must not keep the resource alive past its owner.
    pub fn enqueue_transition(
        self: &Arc<Self>,
        recorder: &mut CommandRecorder,
        new_state: ResidencyState,
    ) -> Result<()> {
        let current = self.residency_state();
        if current == new_state {
            return Ok(());
        }
        if current == ResidencyState::HostVisible || new_state == ResidencyState::HostVisible {
            return Err(Error::InvalidResource(
                "host-visible resources never transition".to_string(),
            ));
        }

        match &self.payload {
            ResourcePayload::Buffer(buffer) => {
                recorder
                    .commands_mut()
                    .buffer_barrier(buffer.as_ref(), current, new_state)?;
            }
            ResourcePayload::Texture(texture) => {
                recorder
                    .commands_mut()
                    .texture_barrier(texture.as_ref(), current, new_state)?;
            }
        }

        let weak = Arc::downgrade(self);
        recorder.push_completion(Box::new(move || {
            if let Some(resource) = weak.upgrade() {
                resource.set_residency_state(new_state);
            }
        }));
        Ok(())
    }

    /// Blocking CPU copy into a host-visible resource.
    ///
    /// `stride` describes the element layout of `data` and must divide its
    /// length. Never valid on a device-local resource; those go through the
    /// uploader's staged path.
    pub fn map_copy_unmap(&self, data: &[u8], stride: u32) -> Result<()> {
        if self.residency_state() != ResidencyState::HostVisible {
            return Err(Error::InvalidResource(
                "map_copy_unmap on a device-local resource".to_string(),
            ));
        }
        let buffer = match &self.payload {
            ResourcePayload::Buffer(buffer) => buffer,
            ResourcePayload::Texture(_) => {
                return Err(Error::InvalidResource(
                    "map_copy_unmap on a texture".to_string(),
                ))
            }
        };
        if stride != 0 && data.len() % stride as usize != 0 {
            return Err(Error::InvalidResource(format!(
                "copy of {} bytes is not a multiple of stride {}",
                data.len(),
                stride
            )));
        }
        if data.len() as u64 > self.byte_len {
            return Err(Error::InvalidResource(format!(
                "copy of {} bytes exceeds resource size {}",
                data.len(),
                self.byte_len
            )));
        }
        buffer.update(0, data)?;
        self.set_upload_state(UploadState::Uploaded);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
