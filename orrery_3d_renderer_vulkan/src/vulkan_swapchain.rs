/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the swapchain images, their framebuffers against the device's
/// surface render pass, and the binary acquire/present semaphores. The
/// core guarantees a full submission-queue flush before `recreate`.

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use orrery_3d::error::{Error, Result};
use orrery_3d::graphics_device::{AcquiredImage, Swapchain};

pub struct VulkanSwapchain {
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    present_queue: vk::Queue,
    render_pass: vk::RenderPass,
    format: vk::SurfaceFormatKHR,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    frame_cursor: usize,
    acquired_semaphore: vk::Semaphore,
}

impl VulkanSwapchain {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: Arc<ash::Device>,
        swapchain_loader: ash::khr::swapchain::Device,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        present_queue: vk::Queue,
        render_pass: vk::RenderPass,
        format: vk::SurfaceFormatKHR,
    ) -> Result<Self> {
        let mut swapchain = Self {
            device,
            swapchain_loader,
            surface_loader,
            surface,
            physical_device,
            present_queue,
            render_pass,
            format,
            swapchain: vk::SwapchainKHR::null(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            extent: vk::Extent2D::default(),
            image_available: Vec::new(),
            render_finished: Vec::new(),
            frame_cursor: 0,
            acquired_semaphore: vk::Semaphore::null(),
        };
        swapchain.build(0, 0)?;
        Ok(swapchain)
    }

    pub(crate) fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub(crate) fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub(crate) fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("no framebuffer {}", image_index)))
    }

    /// Semaphore signaled by the most recent acquire
    pub(crate) fn acquire_semaphore(&self) -> vk::Semaphore {
        self.acquired_semaphore
    }

    /// Semaphore presentation waits on for an image
    pub(crate) fn finish_semaphore(&self, image_index: u32) -> vk::Semaphore {
        self.render_finished[image_index as usize]
    }

    fn destroy_surface_objects(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            for semaphore in self.image_available.drain(..) {
                self.device.destroy_semaphore(semaphore, None);
            }
            for semaphore in self.render_finished.drain(..) {
                self.device.destroy_semaphore(semaphore, None);
            }
        }
    }

    /// (Re)build the swapchain and everything hanging off it. Requested
    /// dimensions of 0 fall back to the surface's current extent.
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| Error::BackendError(format!("surface capabilities: {:?}", e)))?;

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(
                        capabilities.min_image_extent.width,
                        capabilities.max_image_extent.width,
                    ),
                    height: height.clamp(
                        capabilities.min_image_extent.height,
                        capabilities.max_image_extent.height,
                    ),
                }
            };

            let mut image_count = capabilities.min_image_count + 1;
            if capabilities.max_image_count > 0 {
                image_count = image_count.min(capabilities.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| Error::BackendError(format!("create swapchain: {:?}", e)))?;

            self.destroy_surface_objects();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;
            self.frame_cursor = 0;
            self.acquired_semaphore = vk::Semaphore::null();

            let images = self
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| Error::BackendError(format!("swapchain images: {:?}", e)))?;

            for &image in &images {
                let view = self
                    .device
                    .create_image_view(
                        &vk::ImageViewCreateInfo::default()
                            .image(image)
                            .view_type(vk::ImageViewType::TYPE_2D)
                            .format(self.format.format)
                            .subresource_range(vk::ImageSubresourceRange {
                                aspect_mask: vk::ImageAspectFlags::COLOR,
                                base_mip_level: 0,
                                level_count: 1,
                                base_array_layer: 0,
                                layer_count: 1,
                            }),
                        None,
                    )
                    .map_err(|e| Error::BackendError(format!("swapchain image view: {:?}", e)))?;
                self.image_views.push(view);

                let attachments = [view];
                let framebuffer = self
                    .device
                    .create_framebuffer(
                        &vk::FramebufferCreateInfo::default()
                            .render_pass(self.render_pass)
                            .attachments(&attachments)
                            .width(extent.width)
                            .height(extent.height)
                            .layers(1),
                        None,
                    )
                    .map_err(|e| Error::BackendError(format!("framebuffer: {:?}", e)))?;
                self.framebuffers.push(framebuffer);
            }

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            for _ in 0..images.len() {
                self.image_available.push(
                    self.device
                        .create_semaphore(&semaphore_info, None)
                        .map_err(|e| Error::BackendError(format!("semaphore: {:?}", e)))?,
                );
                self.render_finished.push(
                    self.device
                        .create_semaphore(&semaphore_info, None)
                        .map_err(|e| Error::BackendError(format!("semaphore: {:?}", e)))?,
                );
            }

            Ok(())
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self) -> Result<AcquiredImage> {
        let semaphore = self.image_available[self.frame_cursor];
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, _suboptimal)) => {
                self.acquired_semaphore = semaphore;
                Ok(AcquiredImage::Ready(image_index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(e) => Err(Error::BackendError(format!("acquire image: {:?}", e))),
        }
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        let wait_semaphores = [self.render_finished[image_index as usize]];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        self.frame_cursor = (self.frame_cursor + 1) % self.image_available.len();

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        };
        match result {
            Ok(_) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(true),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(Error::BackendError(format!("present: {:?}", e))),
        }
    }

    fn image_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        // Caller has flushed the submission queue; settle the presentation
        // engine too before releasing surface objects.
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| Error::BackendError(format!("wait idle: {:?}", e)))?;
        }
        self.build(width, height)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
        }
        self.destroy_surface_objects();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}
