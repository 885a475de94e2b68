use super::*;
use std::sync::{Arc, Mutex};

use crate::graphics_device::mock_graphics_device::{MockFenceHandle, MockGraphicsDevice, MockLog};
use crate::graphics_device::GraphicsDevice;
use crate::gpu::descriptor_table::PartitionLayout;
use crate::gpu::submission_queue::SubmissionQueue;

struct Harness {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    fence: MockFenceHandle,
    descriptor_writes: MockLog,
}

fn harness() -> (Harness, TextureCache, Uploader, SubmissionQueue, DescriptorTable) {
    let mock = MockGraphicsDevice::new();
    let fence = mock.fence();
    let descriptor_writes = mock.descriptor_writes.clone();
    let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(mock));
    let cache = TextureCache::new(device.clone());
    let uploader = Uploader::new(device.clone()).unwrap();
    let queue = SubmissionQueue::new(device.clone());
    let table = DescriptorTable::new(device.clone(), PartitionLayout::default()).unwrap();
    (
        Harness {
            device,
            fence,
            descriptor_writes,
        },
        cache,
        uploader,
        queue,
        table,
    )
}

fn image(name: &str, size: u32) -> Arc<Image> {
    Arc::new(Image::new(name, size, size, vec![128; (size * size * 4) as usize]).unwrap())
}

#[test]
fn test_miss_creates_texture_slot_and_upload() {
    let (h, mut cache, mut uploader, _queue, mut table) = harness();
    let img = image("checker", 4);

    let residency = cache.get_or_create(&img, &mut uploader, &mut table).unwrap();
    assert_eq!(residency.slot, table.partition_base(DescriptorPartition::Texture));
    assert_eq!(uploader.pending_count(), 1);
    assert!(!residency.is_drawable());

    // The view is written immediately, before the contents exist.
    let writes = h.descriptor_writes.lock().unwrap().clone();
    assert_eq!(writes, vec![format!("texture {} 4x4", residency.slot)]);
}

#[test]
fn test_hit_is_idempotent() {
    let (_h, mut cache, mut uploader, _queue, mut table) = harness();
    let img = image("checker", 4);

    let first = cache.get_or_create(&img, &mut uploader, &mut table).unwrap();
    let second = cache.get_or_create(&img, &mut uploader, &mut table).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.slot, second.slot);
    assert_eq!(uploader.pending_count(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_distinct_images_take_consecutive_slots() {
    let (_h, mut cache, mut uploader, _queue, mut table) = harness();
    let a = cache
        .get_or_create(&image("a", 2), &mut uploader, &mut table)
        .unwrap();
    let b = cache
        .get_or_create(&image("b", 2), &mut uploader, &mut table)
        .unwrap();
    assert_eq!(b.slot, a.slot + 1);
}

#[test]
fn test_texture_becomes_drawable_after_upload_and_transition() {
    let (h, mut cache, mut uploader, mut queue, mut table) = harness();
    let img = image("checker", 4);
    let residency = cache.get_or_create(&img, &mut uploader, &mut table).unwrap();

    // Drive the upload to completion.
    while uploader.pending_count() > 0 || uploader.is_in_flight() {
        uploader.update(&mut queue).unwrap();
        h.fence.complete_through(queue.last_signaled_value());
        queue.run_completed_callbacks();
    }
    assert_eq!(residency.resource.upload_state(), UploadState::Uploaded);
    assert!(!residency.is_drawable());

    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    recorder.begin().unwrap();
    cache.record_pending_transitions(&mut recorder).unwrap();
    queue.submit(&mut recorder).unwrap();
    queue.sync_and_run_callbacks(Vec::new()).unwrap();

    assert_eq!(
        residency.resource.residency_state(),
        ResidencyState::ShaderReadable
    );
    assert!(residency.is_drawable());
}
