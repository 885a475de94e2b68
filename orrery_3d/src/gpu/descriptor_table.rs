/// DescriptorTable - fixed-capacity GPU-visible binding slots, partitioned
/// into static regions for per-frame, per-node, per-material and per-texture
/// data.
///
/// Slot 0 is reserved for the table root. Within a partition, assignment is
/// monotonic and identity-keyed: the first request for an entity claims the
/// next free index, repeats return the same index, and indices are never
/// reclaimed for the lifetime of the process. A full partition is a fatal
/// configuration error, not something to recover from.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::GraphicsDevice;
use crate::gpu::resource::GpuResource;

/// The logical partitions of the table, in slot order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorPartition {
    /// Per-frame constants (single slot)
    Frame,
    /// Per-node constants
    Node,
    /// Per-material constants
    Material,
    /// Texture views
    Texture,
}

/// Partition capacities. The defaults reproduce the fixed reference layout
/// (1 frame slot + 1024 nodes + 1024 materials + 1024 textures after the
/// reserved root slot); tests shrink them to exercise exhaustion.
#[derive(Debug, Clone, Copy)]
pub struct PartitionLayout {
    pub frame_capacity: u32,
    pub node_capacity: u32,
    pub material_capacity: u32,
    pub texture_capacity: u32,
}

impl Default for PartitionLayout {
    fn default() -> Self {
        Self {
            frame_capacity: 1,
            node_capacity: 1024,
            material_capacity: 1024,
            texture_capacity: 1024,
        }
    }
}

impl PartitionLayout {
    /// Total slots including the reserved root slot
    pub fn total_slots(&self) -> u32 {
        1 + self.frame_capacity + self.node_capacity + self.material_capacity + self.texture_capacity
    }
}

struct Partition {
    base: u32,
    capacity: u32,
    next: u32,
    assignments: FxHashMap<u64, u32>,
}

impl Partition {
    fn new(base: u32, capacity: u32) -> Self {
        Self {
            base,
            capacity,
            next: 0,
            assignments: FxHashMap::default(),
        }
    }
}

/// Fixed-capacity table of binding slots
pub struct DescriptorTable {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    partitions: [Partition; 4],
}

impl DescriptorTable {
    /// Reserved table root slot
    pub const ROOT_SLOT: u32 = 0;

    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, layout: PartitionLayout) -> Result<Self> {
        let device_capacity = device.lock().unwrap().descriptor_capacity();
        if layout.total_slots() > device_capacity {
            return Err(Error::InitializationFailed(format!(
                "descriptor layout needs {} slots, device provides {}",
                layout.total_slots(),
                device_capacity
            )));
        }

        let frame_base = 1;
        let node_base = frame_base + layout.frame_capacity;
        let material_base = node_base + layout.node_capacity;
        let texture_base = material_base + layout.material_capacity;

        Ok(Self {
            device,
            partitions: [
                Partition::new(frame_base, layout.frame_capacity),
                Partition::new(node_base, layout.node_capacity),
                Partition::new(material_base, layout.material_capacity),
                Partition::new(texture_base, layout.texture_capacity),
            ],
        })
    }

    fn partition(&self, partition: DescriptorPartition) -> &Partition {
        &self.partitions[partition as usize]
    }

    /// First slot index of a partition
    pub fn partition_base(&self, partition: DescriptorPartition) -> u32 {
        self.partition(partition).base
    }

    /// Number of slots handed out in a partition so far
    pub fn allocated(&self, partition: DescriptorPartition) -> u32 {
        self.partition(partition).next
    }

    /// Whether an identity already owns a slot in the partition
    pub fn is_assigned(&self, partition: DescriptorPartition, identity: u64) -> bool {
        self.partition(partition).assignments.contains_key(&identity)
    }

    /// Stable slot index for an identity: first-seen-wins, monotonic.
    ///
    /// Two distinct identities never share a slot, and a slot once assigned
    /// is never reassigned. Exhausting the partition is fatal.
    pub fn get_or_create_slot(
        &mut self,
        partition: DescriptorPartition,
        identity: u64,
    ) -> Result<u32> {
        let part = &mut self.partitions[partition as usize];
        if let Some(&slot) = part.assignments.get(&identity) {
            return Ok(slot);
        }
        if part.next >= part.capacity {
            return Err(Error::CapacityExhausted(format!(
                "descriptor partition {:?} full ({} slots)",
                partition, part.capacity
            )));
        }
        let slot = part.base + part.next;
        part.next += 1;
        part.assignments.insert(identity, slot);
        Ok(slot)
    }

    /// Zero-based index of a slot within its partition, for addressing the
    /// backing constant-buffer array
    pub fn slot_offset(&self, partition: DescriptorPartition, slot: u32) -> u32 {
        slot - self.partition(partition).base
    }

    /// Point a slot at a buffer range (constant-buffer view)
    pub fn write_buffer(
        &self,
        slot: u32,
        resource: &GpuResource,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let buffer = resource.buffer().ok_or_else(|| {
            Error::InvalidResource("buffer descriptor write on a texture resource".to_string())
        })?;
        self.device
            .lock()
            .unwrap()
            .write_buffer_descriptor(slot, buffer.as_ref(), offset, size)
    }

    /// Point a slot at a texture (shader-resource view)
    pub fn write_texture(&self, slot: u32, resource: &GpuResource) -> Result<()> {
        let texture = resource.texture().ok_or_else(|| {
            Error::InvalidResource("texture descriptor write on a buffer resource".to_string())
        })?;
        self.device
            .lock()
            .unwrap()
            .write_texture_descriptor(slot, texture.as_ref())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "descriptor_table_tests.rs"]
mod tests;
