/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Instance/device bring-up, resource factories, and the submission queue.
/// The core's monotonically increasing fence is a timeline semaphore: every
/// submission signals its value, `completed_fence_value` reads the counter,
/// and `wait_for_fence_value` blocks on it with no timeout.

use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use orrery_3d::error::{Error, Result};
use orrery_3d::graphics_device::{
    BufferDesc, BufferUsage, CommandList, DeviceBuffer, DeviceConfig, DevicePipeline, DeviceShader,
    DeviceTexture, GraphicsDevice, MemoryLocation, PipelineDesc, ShaderDesc, Swapchain,
    TextureDesc, TextureFormat, TextureInfo, TextureUsage,
};
use orrery_3d::render_info;

use crate::vulkan_buffer::VulkanDeviceBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_descriptor::{VulkanDescriptorState, DESCRIPTOR_CAPACITY};
use crate::vulkan_pipeline::VulkanDevicePipeline;
use crate::vulkan_shader::VulkanDeviceShader;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanDeviceTexture;

pub struct VulkanGraphicsDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,

    queue: vk::Queue,
    queue_family: u32,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    surface_format: vk::SurfaceFormatKHR,

    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    descriptors: ManuallyDrop<Arc<VulkanDescriptorState>>,

    /// Timeline semaphore backing the core's fence values
    timeline: vk::Semaphore,

    /// Surface-compatible render pass shared by pipelines and swapchains
    render_pass: vk::RenderPass,

    #[cfg(feature = "vulkan-validation")]
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

fn backend_err<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> Error + '_ {
    move |e| Error::BackendError(format!("{}: {:?}", what, e))
}

fn init_err<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> Error + '_ {
    move |e| Error::InitializationFailed(format!("{}: {:?}", what, e))
}

impl VulkanGraphicsDevice {
    pub fn new(window: &Window, config: DeviceConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| Error::InitializationFailed(format!("load Vulkan: {}", e)))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("invalid app name".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(
                    0,
                    config.app_version.0,
                    config.app_version.1,
                    config.app_version.2,
                ))
                .engine_name(c"Orrery3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| Error::InitializationFailed(format!("display handle: {}", e)))?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(init_err("required extensions"))?
                    .to_vec();

            let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                Vec::new()
            };
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(init_err("create instance"))?;

            #[cfg(feature = "vulkan-validation")]
            let debug = if validation {
                Some(crate::debug::install_messenger(&entry, &instance)?)
            } else {
                None
            };

            let window_handle = window
                .window_handle()
                .map_err(|e| Error::InitializationFailed(format!("window handle: {}", e)))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(init_err("create surface"))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(init_err("enumerate physical devices"))?;

            // First device with a queue family doing graphics + present.
            let (physical_device, queue_family) = physical_devices
                .into_iter()
                .find_map(|candidate| {
                    instance
                        .get_physical_device_queue_family_properties(candidate)
                        .iter()
                        .enumerate()
                        .find(|(index, family)| {
                            family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                                && surface_loader
                                    .get_physical_device_surface_support(
                                        candidate,
                                        *index as u32,
                                        surface,
                                    )
                                    .unwrap_or(false)
                        })
                        .map(|(index, _)| (candidate, index as u32))
                })
                .ok_or_else(|| {
                    Error::InitializationFailed(
                        "no Vulkan device with a graphics+present queue".to_string(),
                    )
                })?;

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            let mut features12 =
                vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut features12);

            let device = Arc::new(
                instance
                    .create_device(physical_device, &device_create_info, None)
                    .map_err(init_err("create device"))?,
            );
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: (*device).clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(init_err("create allocator"))?;

            let surface_formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(init_err("surface formats"))?;
            let surface_format = *surface_formats
                .iter()
                .find(|f| {
                    f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB
                })
                .unwrap_or(&surface_formats[0]);

            let render_pass = Self::create_surface_render_pass(&device, surface_format.format)?;

            let timeline_type = &mut vk::SemaphoreTypeCreateInfo::default()
                .semaphore_type(vk::SemaphoreType::TIMELINE)
                .initial_value(0);
            let timeline = device
                .create_semaphore(
                    &vk::SemaphoreCreateInfo::default().push_next(timeline_type),
                    None,
                )
                .map_err(init_err("timeline semaphore"))?;

            let descriptors = Arc::new(VulkanDescriptorState::new(device.clone())?);

            render_info!(
                "orrery3d::vulkan",
                "Vulkan device ready (queue family {})",
                queue_family
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                queue,
                queue_family,
                surface,
                surface_loader,
                surface_format,
                allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
                descriptors: ManuallyDrop::new(descriptors),
                timeline,
                render_pass,
                #[cfg(feature = "vulkan-validation")]
                debug,
            })
        }
    }

    fn create_surface_render_pass(
        device: &ash::Device,
        format: vk::Format,
    ) -> Result<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_attachment_ref));

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        unsafe {
            device.create_render_pass(
                &vk::RenderPassCreateInfo::default()
                    .attachments(std::slice::from_ref(&color_attachment))
                    .subpasses(std::slice::from_ref(&subpass))
                    .dependencies(std::slice::from_ref(&dependency)),
                None,
            )
        }
        .map_err(init_err("create render pass"))
    }

    fn command_buffer_of<'a>(&self, commands: &'a dyn CommandList) -> Result<&'a VulkanCommandList> {
        commands
            .as_any()
            .downcast_ref::<VulkanCommandList>()
            .ok_or_else(|| {
                Error::InvalidResource("command list is not a Vulkan command list".to_string())
            })
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        let mut usage = vk::BufferUsageFlags::empty();
        if desc.usage.contains(BufferUsage::VERTEX) {
            usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if desc.usage.contains(BufferUsage::INDEX) {
            usage |= vk::BufferUsageFlags::INDEX_BUFFER;
        }
        if desc.usage.contains(BufferUsage::UNIFORM) {
            usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
        }
        if desc.usage.contains(BufferUsage::TRANSFER_SRC) {
            usage |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if desc.usage.contains(BufferUsage::TRANSFER_DST) {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }

        unsafe {
            let buffer = self
                .device
                .create_buffer(
                    &vk::BufferCreateInfo::default()
                        .size(desc.size)
                        .usage(usage)
                        .sharing_mode(vk::SharingMode::EXCLUSIVE),
                    None,
                )
                .map_err(backend_err("create buffer"))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let location = match desc.location {
                MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
                MemoryLocation::HostVisible => gpu_allocator::MemoryLocation::CpuToGpu,
            };
            let allocation = self
                .allocator
                .lock()
                .unwrap()
                .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                    name: "buffer",
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| Error::OutOfMemory)?;

            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(backend_err("bind buffer memory"))?;

            Ok(Arc::new(VulkanDeviceBuffer::new(
                self.device.clone(),
                (*self.allocator).clone(),
                buffer,
                allocation,
                desc.size,
                desc.location,
            )))
        }
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        let format = match desc.format {
            TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
            TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        };
        let mut usage = vk::ImageUsageFlags::empty();
        if desc.usage.contains(TextureUsage::SAMPLED) {
            usage |= vk::ImageUsageFlags::SAMPLED;
        }
        if desc.usage.contains(TextureUsage::TRANSFER_DST) {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }

        unsafe {
            let image = self
                .device
                .create_image(
                    &vk::ImageCreateInfo::default()
                        .image_type(vk::ImageType::TYPE_2D)
                        .format(format)
                        .extent(vk::Extent3D {
                            width: desc.width,
                            height: desc.height,
                            depth: 1,
                        })
                        .mip_levels(1)
                        .array_layers(1)
                        .samples(vk::SampleCountFlags::TYPE_1)
                        .tiling(vk::ImageTiling::OPTIMAL)
                        .usage(usage)
                        .sharing_mode(vk::SharingMode::EXCLUSIVE)
                        .initial_layout(vk::ImageLayout::UNDEFINED),
                    None,
                )
                .map_err(backend_err("create image"))?;

            let requirements = self.device.get_image_memory_requirements(image);
            let allocation = self
                .allocator
                .lock()
                .unwrap()
                .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                    name: "texture",
                    requirements,
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| Error::OutOfMemory)?;

            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(backend_err("bind image memory"))?;

            let view = self
                .device
                .create_image_view(
                    &vk::ImageViewCreateInfo::default()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(format)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        }),
                    None,
                )
                .map_err(backend_err("create image view"))?;

            Ok(Arc::new(VulkanDeviceTexture::new(
                self.device.clone(),
                (*self.allocator).clone(),
                image,
                view,
                allocation,
                TextureInfo {
                    width: desc.width,
                    height: desc.height,
                    format: desc.format,
                    usage: desc.usage,
                },
            )))
        }
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn DeviceShader>> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            return Err(Error::InvalidResource(format!(
                "shader '{}': SPIR-V must be non-empty and 4-byte aligned ({} bytes)",
                desc.name,
                desc.code.len()
            )));
        }
        // Word-align by copying; the source Vec has no alignment guarantee.
        let code_u32: Vec<u32> = desc
            .code
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let module = unsafe {
            self.device
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code_u32), None)
        }
        .map_err(|e| {
            // Rejected SPIR-V is a content problem, recoverable upstream.
            Error::InvalidResource(format!("shader '{}' rejected: {:?}", desc.name, e))
        })?;

        Ok(Arc::new(VulkanDeviceShader::new(
            self.device.clone(),
            module,
            desc.entry_point,
            desc.stage,
        )))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn DevicePipeline>> {
        Ok(Arc::new(VulkanDevicePipeline::build(
            self.device.clone(),
            &desc,
            self.descriptors.pipeline_layout,
            self.render_pass,
        )?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(
            self.device.clone(),
            (*self.descriptors).clone(),
            self.queue_family,
        )?))
    }

    fn create_swapchain(&self, _window: &Window) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(VulkanSwapchain::new(
            self.device.clone(),
            ash::khr::swapchain::Device::new(&self.instance, &self.device),
            self.surface_loader.clone(),
            self.surface,
            self.physical_device,
            self.queue,
            self.render_pass,
            self.surface_format,
        )?))
    }

    fn submit(&self, commands: &dyn CommandList, signal_value: u64) -> Result<()> {
        let vk_commands = self.command_buffer_of(commands)?;
        let command_buffers = [vk_commands.command_buffer];
        let signal_semaphores = [self.timeline];
        let signal_values = [signal_value];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(backend_err("queue submit"))
        }
    }

    fn submit_frame(
        &self,
        commands: &dyn CommandList,
        signal_value: u64,
        swapchain: &dyn Swapchain,
        image_index: u32,
    ) -> Result<()> {
        let vk_commands = self.command_buffer_of(commands)?;
        let vk_swapchain = swapchain
            .as_any()
            .downcast_ref::<VulkanSwapchain>()
            .ok_or_else(|| Error::InvalidResource("swapchain is not a Vulkan swapchain".to_string()))?;

        let command_buffers = [vk_commands.command_buffer];
        let wait_semaphores = [vk_swapchain.acquire_semaphore()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let wait_values = [0];
        let signal_semaphores = [vk_swapchain.finish_semaphore(image_index), self.timeline];
        let signal_values = [0, signal_value];

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(backend_err("queue submit (frame)"))
        }
    }

    fn signal_fence(&self, value: u64) -> Result<()> {
        // Empty submission: the signal lands behind all prior queue work.
        let signal_semaphores = [self.timeline];
        let signal_values = [value];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(backend_err("queue signal"))
        }
    }

    fn completed_fence_value(&self) -> u64 {
        unsafe {
            self.device
                .get_semaphore_counter_value(self.timeline)
                .unwrap_or(0)
        }
    }

    fn wait_for_fence_value(&self, value: u64) -> Result<()> {
        let semaphores = [self.timeline];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe {
            self.device
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(backend_err("wait semaphores"))
        }
    }

    fn descriptor_capacity(&self) -> u32 {
        DESCRIPTOR_CAPACITY
    }

    fn write_buffer_descriptor(
        &self,
        slot: u32,
        buffer: &dyn DeviceBuffer,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let vk_buffer = buffer
            .as_any()
            .downcast_ref::<VulkanDeviceBuffer>()
            .ok_or_else(|| Error::InvalidResource("buffer is not a Vulkan buffer".to_string()))?;
        self.descriptors.write_buffer(slot, vk_buffer.buffer, offset, size)
    }

    fn write_texture_descriptor(&self, slot: u32, texture: &dyn DeviceTexture) -> Result<()> {
        let vk_texture = texture
            .as_any()
            .downcast_ref::<VulkanDeviceTexture>()
            .ok_or_else(|| Error::InvalidResource("texture is not a Vulkan texture".to_string()))?;
        self.descriptors.write_texture(slot, vk_texture.view)
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle().map_err(backend_err("wait idle")) }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            self.device.destroy_semaphore(self.timeline, None);
            self.device.destroy_render_pass(self.render_pass, None);

            // Descriptor state and allocator must go while the device lives.
            ManuallyDrop::drop(&mut self.descriptors);
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            #[cfg(feature = "vulkan-validation")]
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
