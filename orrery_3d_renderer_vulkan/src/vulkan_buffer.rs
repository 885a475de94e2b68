/// VulkanDeviceBuffer - Vulkan implementation of the DeviceBuffer trait

use std::any::Any;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};

use orrery_3d::error::{Error, Result};
use orrery_3d::graphics_device::{DeviceBuffer, MemoryLocation};

/// Vulkan buffer with its gpu-allocator allocation
pub struct VulkanDeviceBuffer {
    device: Arc<ash::Device>,
    allocator: Arc<Mutex<Allocator>>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    location: MemoryLocation,
}

impl VulkanDeviceBuffer {
    pub(crate) fn new(
        device: Arc<ash::Device>,
        allocator: Arc<Mutex<Allocator>>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        location: MemoryLocation,
    ) -> Self {
        Self {
            device,
            allocator,
            buffer,
            allocation: Some(allocation),
            size,
            location,
        }
    }
}

impl DeviceBuffer for VulkanDeviceBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource(
                "update on a device-local buffer".to_string(),
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
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| Error::BackendError("buffer has no allocation".to_string()))?;
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDeviceBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}
