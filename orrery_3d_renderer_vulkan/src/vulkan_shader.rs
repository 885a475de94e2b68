/// VulkanDeviceShader - Vulkan implementation of the DeviceShader trait

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use orrery_3d::graphics_device::{DeviceShader, ShaderStage};

/// Vulkan shader module
pub struct VulkanDeviceShader {
    device: Arc<ash::Device>,
    pub(crate) module: vk::ShaderModule,
    pub(crate) entry_point: String,
    stage: ShaderStage,
}

impl VulkanDeviceShader {
    pub(crate) fn new(
        device: Arc<ash::Device>,
        module: vk::ShaderModule,
        entry_point: String,
        stage: ShaderStage,
    ) -> Self {
        Self {
            device,
            module,
            entry_point,
            stage,
        }
    }

    pub(crate) fn stage_flags(&self) -> vk::ShaderStageFlags {
        match self.stage {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl DeviceShader for VulkanDeviceShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDeviceShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
