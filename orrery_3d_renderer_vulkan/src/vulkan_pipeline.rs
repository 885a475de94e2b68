/// VulkanDevicePipeline - Vulkan implementation of the DevicePipeline trait

use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use ash::vk;

use orrery_3d::error::{Error, Result};
use orrery_3d::graphics_device::{
    BlendMode, DevicePipeline, PipelineDesc, PrimitiveTopology, VertexFormat,
};

use crate::vulkan_shader::VulkanDeviceShader;

/// Vulkan graphics pipeline.
///
/// The pipeline layout is shared (it belongs to the device's descriptor
/// state) and is not destroyed here.
pub struct VulkanDevicePipeline {
    device: Arc<ash::Device>,
    pub(crate) pipeline: vk::Pipeline,
}

fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        VertexFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
    }
}

impl VulkanDevicePipeline {
    /// Build a graphics pipeline targeting the device's surface render pass.
    pub(crate) fn build(
        device: Arc<ash::Device>,
        desc: &PipelineDesc,
        pipeline_layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        let vertex_shader = desc
            .vertex_shader
            .as_any()
            .downcast_ref::<VulkanDeviceShader>()
            .ok_or_else(|| Error::InvalidResource("vertex shader is not a Vulkan shader".to_string()))?;
        let fragment_shader = desc
            .fragment_shader
            .as_any()
            .downcast_ref::<VulkanDeviceShader>()
            .ok_or_else(|| {
                Error::InvalidResource("fragment shader is not a Vulkan shader".to_string())
            })?;

        let entry_vert = CString::new(vertex_shader.entry_point.as_str())
            .map_err(|_| Error::InvalidResource("invalid vertex entry point".to_string()))?;
        let entry_frag = CString::new(fragment_shader.entry_point.as_str())
            .map_err(|_| Error::InvalidResource("invalid fragment entry point".to_string()))?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vertex_shader.stage_flags())
                .module(vertex_shader.module)
                .name(&entry_vert),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(fragment_shader.stage_flags())
                .module(fragment_shader.module)
                .name(&entry_frag),
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_layout
            .bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            })
            .collect();

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport::default()];
        let scissors = [vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = match desc.blend {
            BlendMode::Opaque => vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
            BlendMode::Alpha => vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD),
        };

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        }
        .map_err(|e| {
            // A rejected pipeline is a shader-content problem, recoverable
            // at the material layer.
            Error::InvalidResource(format!("graphics pipeline rejected: {:?}", e.1))
        })?;

        Ok(Self {
            device,
            pipeline: pipelines[0],
        })
    }
}

impl DevicePipeline for VulkanDevicePipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDevicePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
