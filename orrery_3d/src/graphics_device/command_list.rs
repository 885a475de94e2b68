/// CommandList trait and the barrier/binding vocabulary it records.

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::buffer::DeviceBuffer;
use crate::graphics_device::pipeline::DevicePipeline;
use crate::graphics_device::swapchain::Swapchain;
use crate::graphics_device::texture::DeviceTexture;

/// Which GPU-side role/memory domain a resource currently occupies.
///
/// Resources are created in `CopyDestination` (device-local) or
/// `HostVisible` (staging/constant) and transitioned through recorded
/// barriers. The logical state field of a `GpuResource` only follows once
/// the GPU has executed the barrier; this enum is the shared vocabulary
/// between the two layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidencyState {
    /// Destination of staged copies; not yet usable for drawing
    CopyDestination,
    /// Bound as a vertex buffer
    VertexBuffer,
    /// Bound as an index buffer
    IndexBuffer,
    /// Sampled/read from shaders
    ShaderReadable,
    /// CPU-writable memory, directly usable (constants, dynamic geometry)
    HostVisible,
}

/// The four descriptor binding spaces a pipeline sees.
///
/// Values are the set indices used by `bind_descriptor_slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSpace {
    Frame,
    Node,
    Material,
    Texture,
}

impl BindingSpace {
    /// Descriptor set index for this space
    pub fn set_index(&self) -> u32 {
        match self {
            BindingSpace::Frame => 0,
            BindingSpace::Node => 1,
            BindingSpace::Material => 2,
            BindingSpace::Texture => 3,
        }
    }
}

/// Index element types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Viewport rectangle with depth range
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Integer scissor rectangle
#[derive(Debug, Clone, Copy)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Command recording trait.
///
/// A command list is reusable: `begin` discards any previously recorded
/// commands. Barriers and copies must be recorded outside a surface pass.
pub trait CommandList: Send {
    /// Start recording, discarding previous contents
    fn begin(&mut self) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    /// Record a residency transition for a buffer
    fn buffer_barrier(
        &mut self,
        buffer: &dyn DeviceBuffer,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()>;

    /// Record a residency transition for a texture
    fn texture_barrier(
        &mut self,
        texture: &dyn DeviceTexture,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()>;

    /// Record a buffer-to-buffer copy
    fn copy_buffer(
        &mut self,
        src: &dyn DeviceBuffer,
        src_offset: u64,
        dst: &dyn DeviceBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Record a buffer-to-texture copy covering the whole texture
    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn DeviceBuffer,
        src_offset: u64,
        dst: &dyn DeviceTexture,
    ) -> Result<()>;

    /// Begin rendering into a swapchain image
    fn begin_surface_pass(
        &mut self,
        swapchain: &dyn Swapchain,
        image_index: u32,
        clear_color: [f32; 4],
    ) -> Result<()>;

    /// End the surface pass
    fn end_surface_pass(&mut self) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()>;

    /// Bind one descriptor table slot into a binding space
    fn bind_descriptor_slot(&mut self, space: BindingSpace, slot: u32) -> Result<()>;

    fn bind_vertex_buffer(
        &mut self,
        binding: u32,
        buffer: &dyn DeviceBuffer,
        offset: u64,
    ) -> Result<()>;

    fn bind_index_buffer(
        &mut self,
        buffer: &dyn DeviceBuffer,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    /// Downcast support for backends (submission needs the concrete type)
    fn as_any(&self) -> &dyn Any;
}
