/// Mock graphics device for unit tests (no GPU required)
///
/// Implements every device trait without touching a GPU. Created resources
/// and recorded commands are logged as strings into shared trackers, and the
/// completed-fence counter is advanced manually by tests, which makes the
/// fence/upload/callback ordering guarantees observable deterministically.
///
/// `wait_for_fence_value` completes the awaited value immediately, since a mock
/// GPU never hangs. Tests that need "the GPU is not there yet" advance the
/// counter with `MockFenceHandle::complete_through` instead of waiting.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use winit::window::Window;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquiredImage, BindingSpace, BufferDesc, CommandList, DeviceBuffer, DevicePipeline,
    DeviceShader, DeviceTexture, GraphicsDevice, IndexType, MemoryLocation, PipelineDesc, Rect2D,
    ResidencyState, ShaderDesc, ShaderStage, Swapchain, TextureDesc, TextureInfo, Viewport,
};

/// Shared string log used by mock resources and command lists
pub type MockLog = Arc<Mutex<Vec<String>>>;

fn push(log: &MockLog, entry: String) {
    log.lock().unwrap().push(entry);
}

// ============================================================================
// Mock fence
// ============================================================================

/// Cloneable handle onto the mock GPU's completed-fence counter
#[derive(Clone)]
pub struct MockFenceHandle {
    completed: Arc<AtomicU64>,
}

impl MockFenceHandle {
    /// Pretend the GPU has finished all submissions up to `value`
    pub fn complete_through(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::SeqCst);
    }

    /// Current completed value
    pub fn value(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Mock buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub location: MemoryLocation,
    pub contents: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, location: MemoryLocation) -> Self {
        Self {
            size,
            location,
            contents: Mutex::new(vec![0; size as usize]),
        }
    }
}

impl DeviceBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource(
                "update on a device-local mock buffer".to_string(),
            ));
        }
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "update of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        let mut contents = self.contents.lock().unwrap();
        contents[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock texture / shader / pipeline
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
}

impl DeviceTexture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockShader {
    pub name: String,
    pub stage: ShaderStage,
}

impl DeviceShader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub name: String,
}

impl DevicePipeline for MockPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock command list
// ============================================================================

/// Records every call as a string into the device-wide command log
pub struct MockCommandList {
    log: MockLog,
}

impl MockCommandList {
    pub fn new(log: MockLog) -> Self {
        Self { log }
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        push(&self.log, "begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        push(&self.log, "end".to_string());
        Ok(())
    }

    fn buffer_barrier(
        &mut self,
        _buffer: &dyn DeviceBuffer,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()> {
        push(&self.log, format!("buffer_barrier {:?}->{:?}", from, to));
        Ok(())
    }

    fn texture_barrier(
        &mut self,
        _texture: &dyn DeviceTexture,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()> {
        push(&self.log, format!("texture_barrier {:?}->{:?}", from, to));
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        _src: &dyn DeviceBuffer,
        src_offset: u64,
        _dst: &dyn DeviceBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        push(
            &self.log,
            format!("copy_buffer {}+{} -> +{}", size, src_offset, dst_offset),
        );
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        _src: &dyn DeviceBuffer,
        src_offset: u64,
        dst: &dyn DeviceTexture,
    ) -> Result<()> {
        let info = dst.info();
        push(
            &self.log,
            format!(
                "copy_buffer_to_texture +{} -> {}x{}",
                src_offset, info.width, info.height
            ),
        );
        Ok(())
    }

    fn begin_surface_pass(
        &mut self,
        _swapchain: &dyn Swapchain,
        image_index: u32,
        _clear_color: [f32; 4],
    ) -> Result<()> {
        push(&self.log, format!("begin_surface_pass {}", image_index));
        Ok(())
    }

    fn end_surface_pass(&mut self) -> Result<()> {
        push(&self.log, "end_surface_pass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        push(&self.log, "bind_pipeline".to_string());
        Ok(())
    }

    fn bind_descriptor_slot(&mut self, space: BindingSpace, slot: u32) -> Result<()> {
        push(&self.log, format!("bind_descriptor_slot {:?} {}", space, slot));
        Ok(())
    }

    fn bind_vertex_buffer(
        &mut self,
        binding: u32,
        _buffer: &dyn DeviceBuffer,
        offset: u64,
    ) -> Result<()> {
        push(&self.log, format!("bind_vertex_buffer {} +{}", binding, offset));
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        _buffer: &dyn DeviceBuffer,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        push(&self.log, format!("bind_index_buffer +{} {:?}", offset, index_type));
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: Viewport) -> Result<()> {
        push(&self.log, "set_viewport".to_string());
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        push(&self.log, "set_scissor".to_string());
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        push(&self.log, format!("draw {} @{}", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        push(
            &self.log,
            format!("draw_indexed {} @{} +{}", index_count, first_index, vertex_offset),
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock swapchain
// ============================================================================

pub struct MockSwapchain {
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
    /// Image indices presented so far
    pub presented: MockLog,
    /// When set, the next acquire reports OutOfDate (cleared by recreate)
    pub out_of_date: bool,
}

impl MockSwapchain {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            image_count: 3,
            presented: Arc::new(Mutex::new(Vec::new())),
            out_of_date: false,
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self) -> Result<AcquiredImage> {
        if self.out_of_date {
            return Ok(AcquiredImage::OutOfDate);
        }
        Ok(AcquiredImage::Ready(0))
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        push(&self.presented, format!("present {}", image_index));
        Ok(!self.out_of_date)
    }

    fn image_count(&self) -> usize {
        self.image_count as usize
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.out_of_date = false;
        push(&self.presented, format!("recreate {}x{}", width, height));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock graphics device
// ============================================================================

/// Mock device tracking created resources and submissions without a GPU
pub struct MockGraphicsDevice {
    /// Names of created buffers ("buffer_<size>_<location>")
    pub created_buffers: MockLog,
    /// Names of created textures ("texture_<w>x<h>")
    pub created_textures: MockLog,
    /// Names of created shaders
    pub created_shaders: MockLog,
    /// Names of created pipelines
    pub created_pipelines: MockLog,
    /// Every recorded command, in order, across all command lists
    pub command_log: MockLog,
    /// Descriptor writes ("buffer slot +off/size" / "texture slot")
    pub descriptor_writes: MockLog,
    /// Fence values passed to submit/submit_frame/signal_fence, in order
    pub submissions: Arc<Mutex<Vec<u64>>>,
    completed: Arc<AtomicU64>,
    descriptor_capacity: u32,
    /// When set, the next submit/submit_frame/signal_fence fails fatally
    pub fail_next_submit: Arc<Mutex<bool>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            created_buffers: Arc::new(Mutex::new(Vec::new())),
            created_textures: Arc::new(Mutex::new(Vec::new())),
            created_shaders: Arc::new(Mutex::new(Vec::new())),
            created_pipelines: Arc::new(Mutex::new(Vec::new())),
            command_log: Arc::new(Mutex::new(Vec::new())),
            descriptor_writes: Arc::new(Mutex::new(Vec::new())),
            submissions: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(AtomicU64::new(0)),
            descriptor_capacity: 4096,
            fail_next_submit: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_descriptor_capacity(capacity: u32) -> Self {
        let mut device = Self::new();
        device.descriptor_capacity = capacity;
        device
    }

    /// Handle for advancing the mock GPU's progress from tests
    pub fn fence(&self) -> MockFenceHandle {
        MockFenceHandle {
            completed: self.completed.clone(),
        }
    }

    fn check_submit_failure(&self) -> Result<()> {
        let mut fail = self.fail_next_submit.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(Error::BackendError("injected submission failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        push(
            &self.created_buffers,
            format!("buffer_{}_{:?}", desc.size, desc.location),
        );
        Ok(Arc::new(MockBuffer::new(desc.size, desc.location)))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        push(
            &self.created_textures,
            format!("texture_{}x{}", desc.width, desc.height),
        );
        Ok(Arc::new(MockTexture {
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                usage: desc.usage,
            },
        }))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn DeviceShader>> {
        // The mock's notion of "compilation": SPIR-V must be non-empty and
        // word-aligned, matching the real backend's cheapest checks.
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            return Err(Error::InvalidResource(format!(
                "shader '{}': invalid SPIR-V ({} bytes)",
                desc.name,
                desc.code.len()
            )));
        }
        push(&self.created_shaders, format!("shader_{}_{:?}", desc.name, desc.stage));
        Ok(Arc::new(MockShader {
            name: desc.name,
            stage: desc.stage,
        }))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        let name = format!("pipeline_{:?}_{:?}", desc.topology, desc.blend);
        push(&self.created_pipelines, name.clone());
        Ok(Arc::new(MockPipeline { name }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(self.command_log.clone())))
    }

    fn create_swapchain(&self, _window: &Window) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(MockSwapchain::new(800, 600)))
    }

    fn submit(&self, _commands: &dyn CommandList, signal_value: u64) -> Result<()> {
        self.check_submit_failure()?;
        self.submissions.lock().unwrap().push(signal_value);
        Ok(())
    }

    fn submit_frame(
        &self,
        _commands: &dyn CommandList,
        signal_value: u64,
        _swapchain: &dyn Swapchain,
        _image_index: u32,
    ) -> Result<()> {
        self.check_submit_failure()?;
        self.submissions.lock().unwrap().push(signal_value);
        Ok(())
    }

    fn signal_fence(&self, value: u64) -> Result<()> {
        self.check_submit_failure()?;
        self.submissions.lock().unwrap().push(value);
        Ok(())
    }

    fn completed_fence_value(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn wait_for_fence_value(&self, value: u64) -> Result<()> {
        // The mock GPU finishes instantly when waited on.
        self.completed.fetch_max(value, Ordering::SeqCst);
        Ok(())
    }

    fn descriptor_capacity(&self) -> u32 {
        self.descriptor_capacity
    }

    fn write_buffer_descriptor(
        &self,
        slot: u32,
        _buffer: &dyn DeviceBuffer,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        push(
            &self.descriptor_writes,
            format!("buffer {} +{}/{}", slot, offset, size),
        );
        Ok(())
    }

    fn write_texture_descriptor(&self, slot: u32, texture: &dyn DeviceTexture) -> Result<()> {
        let info = texture.info();
        push(
            &self.descriptor_writes,
            format!("texture {} {}x{}", slot, info.width, info.height),
        );
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
