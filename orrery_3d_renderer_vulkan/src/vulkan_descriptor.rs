/// Descriptor state shared between the device and its command lists.
///
/// The core's fixed slot table maps onto one descriptor set per slot, all
/// allocated lazily from a single pool. Buffer slots and texture slots use
/// two small set layouts (one binding each); the pipeline layout stacks
/// them in binding-space order: frame, node, material, texture.

use std::sync::{Arc, Mutex};

use ash::vk;
use rustc_hash::FxHashMap;

use orrery_3d::error::{Error, Result};

/// Total slots the backend can serve
pub(crate) const DESCRIPTOR_CAPACITY: u32 = 4096;

pub(crate) struct VulkanDescriptorState {
    device: Arc<ash::Device>,
    pool: vk::DescriptorPool,
    pub(crate) buffer_set_layout: vk::DescriptorSetLayout,
    pub(crate) texture_set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) default_sampler: vk::Sampler,
    sets: Mutex<FxHashMap<u32, vk::DescriptorSet>>,
}

impl VulkanDescriptorState {
    pub(crate) fn new(device: Arc<ash::Device>) -> Result<Self> {
        unsafe {
            let buffer_binding = vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
            let buffer_set_layout = device
                .create_descriptor_set_layout(
                    &vk::DescriptorSetLayoutCreateInfo::default()
                        .bindings(std::slice::from_ref(&buffer_binding)),
                    None,
                )
                .map_err(|e| {
                    Error::InitializationFailed(format!("buffer set layout: {:?}", e))
                })?;

            let texture_binding = vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT);
            let texture_set_layout = device
                .create_descriptor_set_layout(
                    &vk::DescriptorSetLayoutCreateInfo::default()
                        .bindings(std::slice::from_ref(&texture_binding)),
                    None,
                )
                .map_err(|e| {
                    Error::InitializationFailed(format!("texture set layout: {:?}", e))
                })?;

            // Binding spaces 0..3: frame, node, material constants are
            // buffer views; space 3 is the texture view.
            let set_layouts = [
                buffer_set_layout,
                buffer_set_layout,
                buffer_set_layout,
                texture_set_layout,
            ];
            let pipeline_layout = device
                .create_pipeline_layout(
                    &vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts),
                    None,
                )
                .map_err(|e| Error::InitializationFailed(format!("pipeline layout: {:?}", e)))?;

            let pool_sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: DESCRIPTOR_CAPACITY,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: DESCRIPTOR_CAPACITY,
                },
            ];
            let pool = device
                .create_descriptor_pool(
                    &vk::DescriptorPoolCreateInfo::default()
                        .max_sets(DESCRIPTOR_CAPACITY)
                        .pool_sizes(&pool_sizes),
                    None,
                )
                .map_err(|e| Error::InitializationFailed(format!("descriptor pool: {:?}", e)))?;

            let default_sampler = device
                .create_sampler(
                    &vk::SamplerCreateInfo::default()
                        .mag_filter(vk::Filter::LINEAR)
                        .min_filter(vk::Filter::LINEAR)
                        .address_mode_u(vk::SamplerAddressMode::REPEAT)
                        .address_mode_v(vk::SamplerAddressMode::REPEAT)
                        .address_mode_w(vk::SamplerAddressMode::REPEAT),
                    None,
                )
                .map_err(|e| Error::InitializationFailed(format!("sampler: {:?}", e)))?;

            Ok(Self {
                device,
                pool,
                buffer_set_layout,
                texture_set_layout,
                pipeline_layout,
                default_sampler,
                sets: Mutex::new(FxHashMap::default()),
            })
        }
    }

    /// Fetch or allocate the descriptor set backing a slot
    fn slot_set(&self, slot: u32, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let mut sets = self.sets.lock().unwrap();
        if let Some(&set) = sets.get(&slot) {
            return Ok(set);
        }
        let layouts = [layout];
        let allocated = unsafe {
            self.device.allocate_descriptor_sets(
                &vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(self.pool)
                    .set_layouts(&layouts),
            )
        }
        .map_err(|e| Error::BackendError(format!("descriptor set allocation: {:?}", e)))?;
        sets.insert(slot, allocated[0]);
        Ok(allocated[0])
    }

    /// Descriptor set for an already-written slot
    pub(crate) fn lookup(&self, slot: u32) -> Result<vk::DescriptorSet> {
        self.sets
            .lock()
            .unwrap()
            .get(&slot)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("descriptor slot {} never written", slot)))
    }

    pub(crate) fn write_buffer(
        &self,
        slot: u32,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let set = self.slot_set(slot, self.buffer_set_layout)?;
        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(offset)
            .range(size);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    pub(crate) fn write_texture(&self, slot: u32, view: vk::ImageView) -> Result<()> {
        let set = self.slot_set(slot, self.texture_set_layout)?;
        let image_info = vk::DescriptorImageInfo::default()
            .sampler(self.default_sampler)
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }
}

impl Drop for VulkanDescriptorState {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.default_sampler, None);
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.buffer_set_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.texture_set_layout, None);
        }
    }
}
