/// VulkanDeviceTexture - Vulkan implementation of the DeviceTexture trait

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};

use orrery_3d::graphics_device::{DeviceTexture, TextureInfo};

/// Vulkan image + view with its gpu-allocator allocation
pub struct VulkanDeviceTexture {
    device: Arc<ash::Device>,
    allocator: Arc<Mutex<Allocator>>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    info: TextureInfo,
}

impl VulkanDeviceTexture {
    pub(crate) fn new(
        device: Arc<ash::Device>,
        allocator: Arc<Mutex<Allocator>>,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Allocation,
        info: TextureInfo,
    ) -> Self {
        Self {
            device,
            allocator,
            image,
            view,
            allocation: Some(allocation),
            info,
        }
    }
}

impl DeviceTexture for VulkanDeviceTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDeviceTexture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.device.destroy_image(self.image, None);
        }
    }
}
