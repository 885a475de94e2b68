use super::*;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockLog};
use crate::graphics_device::{BufferUsage, GraphicsDevice};
use crate::gpu::resource::GpuResource;
use crate::resource::next_entity_id;

fn mock_device() -> (Arc<Mutex<dyn GraphicsDevice>>, MockLog) {
    let mock = MockGraphicsDevice::new();
    let writes = mock.descriptor_writes.clone();
    (Arc::new(Mutex::new(mock)), writes)
}

fn table(device: &Arc<Mutex<dyn GraphicsDevice>>) -> DescriptorTable {
    DescriptorTable::new(device.clone(), PartitionLayout::default()).unwrap()
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_partitions_are_disjoint_and_ordered() {
    let (device, _) = mock_device();
    let table = table(&device);

    assert_eq!(DescriptorTable::ROOT_SLOT, 0);
    assert_eq!(table.partition_base(DescriptorPartition::Frame), 1);
    assert_eq!(table.partition_base(DescriptorPartition::Node), 2);
    assert_eq!(table.partition_base(DescriptorPartition::Material), 2 + 1024);
    assert_eq!(table.partition_base(DescriptorPartition::Texture), 2 + 2048);
}

#[test]
fn test_default_layout_total() {
    assert_eq!(PartitionLayout::default().total_slots(), 1 + 1 + 3 * 1024);
}

#[test]
fn test_layout_must_fit_device_capacity() {
    let device: Arc<Mutex<dyn GraphicsDevice>> =
        Arc::new(Mutex::new(MockGraphicsDevice::with_descriptor_capacity(16)));
    let result = DescriptorTable::new(device, PartitionLayout::default());
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

// ============================================================================
// Slot assignment (P5, Scenario C)
// ============================================================================

#[test]
fn test_repeats_are_idempotent_and_new_identities_monotonic() {
    let (device, _) = mock_device();
    let mut table = table(&device);

    let t1 = next_entity_id();
    let t2 = next_entity_id();

    let a = table.get_or_create_slot(DescriptorPartition::Texture, t1).unwrap();
    let b = table.get_or_create_slot(DescriptorPartition::Texture, t1).unwrap();
    let c = table.get_or_create_slot(DescriptorPartition::Texture, t2).unwrap();

    assert_eq!(a, b);
    assert_eq!(c, a + 1);
    assert_eq!(table.allocated(DescriptorPartition::Texture), 2);
}

#[test]
fn test_distinct_identities_never_share_a_slot() {
    let (device, _) = mock_device();
    let mut table = table(&device);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..64 {
        let slot = table
            .get_or_create_slot(DescriptorPartition::Node, next_entity_id())
            .unwrap();
        assert!(seen.insert(slot), "slot {} assigned twice", slot);
    }
}

#[test]
fn test_same_identity_in_different_partitions_gets_different_slots() {
    let (device, _) = mock_device();
    let mut table = table(&device);

    let id = next_entity_id();
    let node = table.get_or_create_slot(DescriptorPartition::Node, id).unwrap();
    let material = table.get_or_create_slot(DescriptorPartition::Material, id).unwrap();
    assert_ne!(node, material);
}

#[test]
fn test_is_assigned_and_slot_offset() {
    let (device, _) = mock_device();
    let mut table = table(&device);

    let id = next_entity_id();
    assert!(!table.is_assigned(DescriptorPartition::Node, id));
    let slot = table.get_or_create_slot(DescriptorPartition::Node, id).unwrap();
    assert!(table.is_assigned(DescriptorPartition::Node, id));
    assert_eq!(table.slot_offset(DescriptorPartition::Node, slot), 0);
}

// ============================================================================
// Exhaustion
// ============================================================================

#[test]
fn test_partition_exhaustion_is_fatal() {
    let (device, _) = mock_device();
    let layout = PartitionLayout {
        texture_capacity: 2,
        ..PartitionLayout::default()
    };
    let mut table = DescriptorTable::new(device, layout).unwrap();

    table
        .get_or_create_slot(DescriptorPartition::Texture, next_entity_id())
        .unwrap();
    table
        .get_or_create_slot(DescriptorPartition::Texture, next_entity_id())
        .unwrap();

    let result = table.get_or_create_slot(DescriptorPartition::Texture, next_entity_id());
    assert!(matches!(result, Err(Error::CapacityExhausted(_))));
}

#[test]
fn test_exhaustion_does_not_disturb_existing_assignments() {
    let (device, _) = mock_device();
    let layout = PartitionLayout {
        node_capacity: 1,
        ..PartitionLayout::default()
    };
    let mut table = DescriptorTable::new(device, layout).unwrap();

    let id = next_entity_id();
    let slot = table.get_or_create_slot(DescriptorPartition::Node, id).unwrap();
    assert!(table
        .get_or_create_slot(DescriptorPartition::Node, next_entity_id())
        .is_err());
    assert_eq!(table.get_or_create_slot(DescriptorPartition::Node, id).unwrap(), slot);
}

// ============================================================================
// Descriptor writes
// ============================================================================

#[test]
fn test_write_buffer_reaches_the_device() {
    let (device, writes) = mock_device();
    let table = table(&device);
    let buffer = GpuResource::host_visible_buffer(&device, 256, 64, BufferUsage::UNIFORM).unwrap();

    table.write_buffer(1, &buffer, 64, 64).unwrap();
    let log = writes.lock().unwrap().clone();
    assert_eq!(log, vec!["buffer 1 +64/64"]);
}

#[test]
fn test_write_buffer_rejects_texture_resources() {
    let (device, _) = mock_device();
    let table = table(&device);
    let texture = GpuResource::sampled_texture(
        &device,
        2,
        2,
        crate::graphics_device::TextureFormat::R8G8B8A8_UNORM,
    )
    .unwrap();

    assert!(table.write_buffer(1, &texture, 0, 16).is_err());
    assert!(table.write_texture(1, &texture).is_ok());
}
