/// GraphicsDevice trait - backend factory, submission queue and fence.

use std::sync::Arc;
use winit::window::Window;

use crate::error::Result;
use crate::graphics_device::{
    BufferDesc, CommandList, DeviceBuffer, DevicePipeline, DeviceShader, DeviceTexture,
    PipelineDesc, ShaderDesc, Swapchain, TextureDesc,
};

/// Device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Orrery Viewer".to_string(),
            app_version: (0, 1, 0),
        }
    }
}

/// Main graphics device trait.
///
/// Factory for GPU resources plus the single submission queue and its
/// monotonically increasing fence. Fence values start at 0 ("nothing
/// completed"); every submission signals a caller-chosen strictly greater
/// value once the GPU has finished it.
pub trait GraphicsDevice: Send + Sync {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn DeviceBuffer>>;

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn DeviceTexture>>;

    /// Create a shader module.
    ///
    /// An invalid SPIR-V blob yields `Error::InvalidResource`, which callers
    /// treat as a recoverable compile failure.
    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn DeviceShader>>;

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn DevicePipeline>>;

    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    fn create_swapchain(&self, window: &Window) -> Result<Box<dyn Swapchain>>;

    /// Submit a recorded command list; the GPU signals `signal_value` when
    /// it has finished executing it.
    ///
    /// Failure is fatal: a mid-frame submission error is not recoverable
    /// and is never retried.
    fn submit(&self, commands: &dyn CommandList, signal_value: u64) -> Result<()>;

    /// Submit a frame's command list and schedule presentation of the given
    /// swapchain image after it.
    fn submit_frame(
        &self,
        commands: &dyn CommandList,
        signal_value: u64,
        swapchain: &dyn Swapchain,
        image_index: u32,
    ) -> Result<()>;

    /// Enqueue a fence signal behind all previously submitted work, without
    /// submitting any commands.
    fn signal_fence(&self, value: u64) -> Result<()>;

    /// Highest fence value the GPU has finished
    fn completed_fence_value(&self) -> u64;

    /// Block until the GPU has reached `value`.
    ///
    /// There is no timeout; a hung GPU blocks the caller indefinitely.
    fn wait_for_fence_value(&self, value: u64) -> Result<()>;

    /// Total number of slots in the device's descriptor table
    fn descriptor_capacity(&self) -> u32;

    /// Point a descriptor slot at a buffer range (constant-buffer view)
    fn write_buffer_descriptor(
        &self,
        slot: u32,
        buffer: &dyn DeviceBuffer,
        offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Point a descriptor slot at a texture (shader-resource view)
    fn write_texture_descriptor(&self, slot: u32, texture: &dyn DeviceTexture) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}
