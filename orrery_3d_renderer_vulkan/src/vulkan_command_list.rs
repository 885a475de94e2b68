/// VulkanCommandList - Vulkan implementation of the CommandList trait
///
/// Translates the core's residency-state barrier vocabulary into Vulkan
/// pipeline barriers, and the descriptor-slot binding model into per-slot
/// descriptor sets on the shared pipeline layout.

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use orrery_3d::error::{Error, Result};
use orrery_3d::graphics_device::{
    BindingSpace, CommandList, DeviceBuffer, DevicePipeline, DeviceTexture, IndexType, Rect2D,
    ResidencyState, Swapchain, Viewport,
};

use crate::vulkan_buffer::VulkanDeviceBuffer;
use crate::vulkan_descriptor::VulkanDescriptorState;
use crate::vulkan_pipeline::VulkanDevicePipeline;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanDeviceTexture;

pub struct VulkanCommandList {
    device: Arc<ash::Device>,
    descriptors: Arc<VulkanDescriptorState>,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
}

fn buffer_access(state: ResidencyState) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match state {
        ResidencyState::CopyDestination => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        ResidencyState::VertexBuffer => (
            vk::PipelineStageFlags::VERTEX_INPUT,
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        ),
        ResidencyState::IndexBuffer => {
            (vk::PipelineStageFlags::VERTEX_INPUT, vk::AccessFlags::INDEX_READ)
        }
        ResidencyState::ShaderReadable => (
            vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        ResidencyState::HostVisible => (vk::PipelineStageFlags::HOST, vk::AccessFlags::HOST_WRITE),
    }
}

fn image_layout(state: ResidencyState) -> vk::ImageLayout {
    match state {
        ResidencyState::CopyDestination => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ResidencyState::ShaderReadable => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        // Buffers-only states; an image never reaches them.
        _ => vk::ImageLayout::GENERAL,
    }
}

fn downcast_buffer(buffer: &dyn DeviceBuffer) -> Result<&VulkanDeviceBuffer> {
    buffer
        .as_any()
        .downcast_ref::<VulkanDeviceBuffer>()
        .ok_or_else(|| Error::InvalidResource("buffer is not a Vulkan buffer".to_string()))
}

fn downcast_texture(texture: &dyn DeviceTexture) -> Result<&VulkanDeviceTexture> {
    texture
        .as_any()
        .downcast_ref::<VulkanDeviceTexture>()
        .ok_or_else(|| Error::InvalidResource("texture is not a Vulkan texture".to_string()))
}

impl VulkanCommandList {
    pub(crate) fn new(
        device: Arc<ash::Device>,
        descriptors: Arc<VulkanDescriptorState>,
        queue_family: u32,
    ) -> Result<Self> {
        unsafe {
            let command_pool = device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default()
                        .queue_family_index(queue_family)
                        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                    None,
                )
                .map_err(|e| Error::BackendError(format!("command pool: {:?}", e)))?;

            let command_buffers = device
                .allocate_command_buffers(
                    &vk::CommandBufferAllocateInfo::default()
                        .command_pool(command_pool)
                        .level(vk::CommandBufferLevel::PRIMARY)
                        .command_buffer_count(1),
                )
                .map_err(|e| Error::BackendError(format!("command buffer: {:?}", e)))?;

            Ok(Self {
                device,
                descriptors,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    fn require_recording(&self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("command list not recording".to_string()));
        }
        Ok(())
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("command list already recording".to_string()));
        }
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("reset command buffer: {:?}", e)))?;
            self.device
                .begin_command_buffer(
                    self.command_buffer,
                    &vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .map_err(|e| Error::BackendError(format!("begin command buffer: {:?}", e)))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError(
                "surface pass not ended before ending command list".to_string(),
            ));
        }
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("end command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn buffer_barrier(
        &mut self,
        buffer: &dyn DeviceBuffer,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_buffer = downcast_buffer(buffer)?;
        let (src_stage, src_access) = buffer_access(from);
        let (dst_stage, dst_access) = buffer_access(to);

        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(vk_buffer.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE);

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
        Ok(())
    }

    fn texture_barrier(
        &mut self,
        texture: &dyn DeviceTexture,
        from: ResidencyState,
        to: ResidencyState,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_texture = downcast_texture(texture)?;
        let (src_stage, src_access) = buffer_access(from);
        let (dst_stage, dst_access) = buffer_access(to);

        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .old_layout(image_layout(from))
            .new_layout(image_layout(to))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vk_texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: &dyn DeviceBuffer,
        src_offset: u64,
        dst: &dyn DeviceBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_src = downcast_buffer(src)?;
        let vk_dst = downcast_buffer(dst)?;
        let region = vk::BufferCopy::default()
            .src_offset(src_offset)
            .dst_offset(dst_offset)
            .size(size);
        unsafe {
            self.device
                .cmd_copy_buffer(self.command_buffer, vk_src.buffer, vk_dst.buffer, &[region]);
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn DeviceBuffer,
        src_offset: u64,
        dst: &dyn DeviceTexture,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_src = downcast_buffer(src)?;
        let vk_dst = downcast_texture(dst)?;
        let info = dst.info();

        // Images are created in UNDEFINED; move to the copy-destination
        // layout the core's CopyDestination state stands for.
        let to_transfer = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vk_dst.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let region = vk::BufferImageCopy::default()
            .buffer_offset(src_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D {
                width: info.width,
                height: info.height,
                depth: 1,
            });

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_src.buffer,
                vk_dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn begin_surface_pass(
        &mut self,
        swapchain: &dyn Swapchain,
        image_index: u32,
        clear_color: [f32; 4],
    ) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("already inside a surface pass".to_string()));
        }
        let vk_swapchain = swapchain
            .as_any()
            .downcast_ref::<VulkanSwapchain>()
            .ok_or_else(|| Error::InvalidResource("swapchain is not a Vulkan swapchain".to_string()))?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_swapchain.render_pass())
            .framebuffer(vk_swapchain.framebuffer(image_index)?)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk_swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_surface_pass(&mut self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("not inside a surface pass".to_string()));
        }
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        self.require_recording()?;
        let vk_pipeline = pipeline
            .as_any()
            .downcast_ref::<VulkanDevicePipeline>()
            .ok_or_else(|| Error::InvalidResource("pipeline is not a Vulkan pipeline".to_string()))?;
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_slot(&mut self, space: BindingSpace, slot: u32) -> Result<()> {
        self.require_recording()?;
        let set = self.descriptors.lookup(slot)?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.descriptors.pipeline_layout,
                space.set_index(),
                &[set],
                &[],
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(
        &mut self,
        binding: u32,
        buffer: &dyn DeviceBuffer,
        offset: u64,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_buffer = downcast_buffer(buffer)?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                binding,
                &[vk_buffer.buffer],
                &[offset],
            );
        }
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: &dyn DeviceBuffer,
        offset: u64,
        index_type: IndexType,
    ) -> Result<()> {
        self.require_recording()?;
        let vk_buffer = downcast_buffer(buffer)?;
        let vk_index_type = match index_type {
            IndexType::U16 => vk::IndexType::UINT16,
            IndexType::U32 => vk::IndexType::UINT32,
        };
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                vk_index_type,
            );
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording()?;
        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording()?;
        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D {
                x: scissor.x,
                y: scissor.y,
            })
            .extent(vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            });
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("draw outside a surface pass".to_string()));
        }
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("draw outside a surface pass".to_string()));
        }
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Freeing the pool also frees its command buffer.
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
