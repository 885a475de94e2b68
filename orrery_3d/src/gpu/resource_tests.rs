use super::*;
use std::sync::{Arc, Mutex};

use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockLog};
use crate::graphics_device::{BufferUsage, GraphicsDevice, ResidencyState, TextureFormat};
use crate::gpu::command_recorder::CommandRecorder;

struct Trackers {
    command_log: MockLog,
}

fn mock_device() -> (Arc<Mutex<dyn GraphicsDevice>>, Trackers) {
    let mock = MockGraphicsDevice::new();
    let trackers = Trackers {
        command_log: mock.command_log.clone(),
    };
    (Arc::new(Mutex::new(mock)), trackers)
}

// ============================================================================
// Creation states
// ============================================================================

#[test]
fn test_device_local_buffer_starts_copy_destination() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 256, 16, BufferUsage::VERTEX).unwrap();
    assert_eq!(resource.residency_state(), ResidencyState::CopyDestination);
    assert_eq!(resource.upload_state(), UploadState::None);
    assert!(!resource.is_drawable());
}

#[test]
fn test_host_visible_buffer_starts_host_visible() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::host_visible_buffer(&device, 256, 16, BufferUsage::UNIFORM).unwrap();
    assert_eq!(resource.residency_state(), ResidencyState::HostVisible);
    assert_eq!(resource.upload_state(), UploadState::None);
    // Right residency but nothing written yet.
    assert!(!resource.is_drawable());
}

#[test]
fn test_sampled_texture_starts_copy_destination() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::sampled_texture(&device, 4, 4, TextureFormat::R8G8B8A8_UNORM).unwrap();
    assert_eq!(resource.residency_state(), ResidencyState::CopyDestination);
    assert!(resource.texture().is_some());
    assert!(resource.buffer().is_none());
}

#[test]
fn test_element_count_derives_from_stride() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 256, 16, BufferUsage::VERTEX).unwrap();
    assert_eq!(resource.byte_len(), 256);
    assert_eq!(resource.stride(), 16);
    assert_eq!(resource.element_count(), 16);
}

// ============================================================================
// Upload state monotonicity (P1)
// ============================================================================

#[test]
fn test_upload_state_only_advances() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 4, BufferUsage::VERTEX).unwrap();

    resource.set_upload_state(UploadState::Enqueued);
    assert_eq!(resource.upload_state(), UploadState::Enqueued);

    // Re-enqueueing while already enqueued is a no-op, not a regression.
    resource.set_upload_state(UploadState::Enqueued);
    assert_eq!(resource.upload_state(), UploadState::Enqueued);

    resource.set_upload_state(UploadState::Uploaded);
    assert_eq!(resource.upload_state(), UploadState::Uploaded);

    resource.set_upload_state(UploadState::Uploaded);
    assert_eq!(resource.upload_state(), UploadState::Uploaded);
}

#[test]
fn test_drawable_requires_terminal_combination() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 4, BufferUsage::VERTEX).unwrap();

    // CopyDestination/None
    assert!(!resource.is_drawable());

    // CopyDestination/Enqueued
    resource.set_upload_state(UploadState::Enqueued);
    assert!(!resource.is_drawable());

    // CopyDestination/Uploaded: uploaded but not yet transitioned
    resource.set_upload_state(UploadState::Uploaded);
    assert!(!resource.is_drawable());
}

// ============================================================================
// Deferred transitions
// ============================================================================

#[test]
fn test_transition_records_barrier_immediately_but_defers_state() {
    let (device, trackers) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 4, BufferUsage::VERTEX).unwrap();
    let mut recorder = CommandRecorder::new(&device).unwrap();

    recorder.begin().unwrap();
    resource
        .enqueue_transition(&mut recorder, ResidencyState::VertexBuffer)
        .unwrap();

    // Barrier recorded now...
    let log = trackers.command_log.lock().unwrap().clone();
    assert!(log
        .iter()
        .any(|c| c == "buffer_barrier CopyDestination->VertexBuffer"));

    // ...logical state unchanged until the completion callback runs.
    assert_eq!(resource.residency_state(), ResidencyState::CopyDestination);

    for callback in recorder.take_completions() {
        callback();
    }
    assert_eq!(resource.residency_state(), ResidencyState::VertexBuffer);
}

#[test]
fn test_transition_to_same_state_is_noop() {
    let (device, trackers) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 4, BufferUsage::VERTEX).unwrap();
    let mut recorder = CommandRecorder::new(&device).unwrap();

    recorder.begin().unwrap();
    resource
        .enqueue_transition(&mut recorder, ResidencyState::CopyDestination)
        .unwrap();
    assert_eq!(recorder.completion_count(), 0);
    assert!(trackers.command_log.lock().unwrap().iter().all(|c| c == "begin"));
}

#[test]
fn test_host_visible_never_transitions() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::host_visible_buffer(&device, 64, 4, BufferUsage::UNIFORM).unwrap();
    let mut recorder = CommandRecorder::new(&device).unwrap();

    recorder.begin().unwrap();
    assert!(resource
        .enqueue_transition(&mut recorder, ResidencyState::VertexBuffer)
        .is_err());
}

#[test]
fn test_transition_callback_holds_weak_reference() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 4, BufferUsage::VERTEX).unwrap();
    let mut recorder = CommandRecorder::new(&device).unwrap();

    recorder.begin().unwrap();
    resource
        .enqueue_transition(&mut recorder, ResidencyState::VertexBuffer)
        .unwrap();

    let callbacks = recorder.take_completions();
    drop(resource);
    // Target gone; the callback must not resurrect or crash.
    for callback in callbacks {
        callback();
    }
}

// ============================================================================
// map_copy_unmap
// ============================================================================

#[test]
fn test_map_copy_unmap_marks_uploaded_and_drawable() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::host_visible_buffer(&device, 64, 16, BufferUsage::UNIFORM).unwrap();

    resource.map_copy_unmap(&[7u8; 64], 16).unwrap();
    assert_eq!(resource.upload_state(), UploadState::Uploaded);
    assert!(resource.is_drawable());
}

#[test]
fn test_map_copy_unmap_rejects_device_local() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::device_local_buffer(&device, 64, 16, BufferUsage::VERTEX).unwrap();
    assert!(resource.map_copy_unmap(&[0u8; 64], 16).is_err());
    assert_eq!(resource.upload_state(), UploadState::None);
}

#[test]
fn test_map_copy_unmap_rejects_oversized_and_misaligned() {
    let (device, _) = mock_device();
    let resource =
        GpuResource::host_visible_buffer(&device, 64, 16, BufferUsage::UNIFORM).unwrap();
    // Larger than the allocation
    assert!(resource.map_copy_unmap(&[0u8; 128], 16).is_err());
    // Not a whole number of elements
    assert!(resource.map_copy_unmap(&[0u8; 24], 16).is_err());
}
