/*!
# Orrery 3D - Vulkan renderer backend

Implements the `orrery_3d` GraphicsDevice trait family with ash +
gpu-allocator. The core's monotonically increasing fence maps onto a
timeline semaphore; the fixed descriptor table maps onto one descriptor
set per slot, allocated from a single pool.

Enable the `vulkan-validation` feature to compile in the validation
layers and the debug messenger.
*/

mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_descriptor;
mod vulkan_device;
mod vulkan_pipeline;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_device::VulkanGraphicsDevice;
