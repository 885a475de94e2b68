use super::*;
use std::sync::{Arc, Mutex};

use crate::graphics_device::mock_graphics_device::{MockFenceHandle, MockGraphicsDevice};
use crate::graphics_device::GraphicsDevice;
use crate::gpu::command_recorder::CommandRecorder;

struct Harness {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    fence: MockFenceHandle,
    submissions: Arc<Mutex<Vec<u64>>>,
    fail_next_submit: Arc<Mutex<bool>>,
}

fn harness() -> Harness {
    let mock = MockGraphicsDevice::new();
    let fence = mock.fence();
    let submissions = mock.submissions.clone();
    let fail_next_submit = mock.fail_next_submit.clone();
    Harness {
        device: Arc::new(Mutex::new(mock)),
        fence,
        submissions,
        fail_next_submit,
    }
}

fn tracker(order: &Arc<Mutex<Vec<u32>>>, tag: u32) -> Box<dyn FnOnce() + Send> {
    let order = order.clone();
    Box::new(move || order.lock().unwrap().push(tag))
}

// ============================================================================
// Fence values
// ============================================================================

#[test]
fn test_signal_is_strictly_increasing() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let a = queue.signal();
    let b = queue.signal();
    let c = queue.signal();
    assert!(a < b && b < c);
    assert_eq!(queue.last_signaled_value(), c);
}

#[test]
fn test_submit_passes_increasing_values_to_the_device() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();

    for _ in 0..3 {
        recorder.begin().unwrap();
        queue.submit(&mut recorder).unwrap();
    }
    assert_eq!(*h.submissions.lock().unwrap(), vec![1, 2, 3]);
}

// ============================================================================
// Callback ordering (P2)
// ============================================================================

#[test]
fn test_callbacks_wait_for_gpu_completion() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 1));
    let value = queue.submit(&mut recorder).unwrap();

    // GPU has not reached the value yet.
    queue.run_completed_callbacks();
    assert!(order.lock().unwrap().is_empty());
    assert_eq!(queue.pending_count(), 1);

    h.fence.complete_through(value);
    queue.run_completed_callbacks();
    assert_eq!(*order.lock().unwrap(), vec![1]);
    assert_eq!(queue.pending_count(), 0);
}

#[test]
fn test_earlier_fence_callbacks_run_entirely_first() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 10));
    recorder.push_completion(tracker(&order, 11));
    let a = queue.submit(&mut recorder).unwrap();

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 20));
    let b = queue.submit(&mut recorder).unwrap();
    assert!(a < b);

    // Completing both at once must still run a's callbacks before b's.
    h.fence.complete_through(b);
    queue.run_completed_callbacks();
    assert_eq!(*order.lock().unwrap(), vec![10, 11, 20]);
}

#[test]
fn test_partial_completion_only_releases_earlier_submissions() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 1));
    let a = queue.submit(&mut recorder).unwrap();

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 2));
    queue.submit(&mut recorder).unwrap();

    h.fence.complete_through(a);
    queue.run_completed_callbacks();
    assert_eq!(*order.lock().unwrap(), vec![1]);
    assert_eq!(queue.pending_count(), 1);
}

// ============================================================================
// sync_and_run_callbacks
// ============================================================================

#[test]
fn test_sync_runs_everything_with_extras_last() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 1));
    queue.submit(&mut recorder).unwrap();

    queue
        .sync_and_run_callbacks(vec![tracker(&order, 99)])
        .unwrap();

    assert_eq!(*order.lock().unwrap(), vec![1, 99]);
    assert_eq!(queue.pending_count(), 0);
    // The blocking wait drove the GPU to the sync's own fence value.
    assert_eq!(queue.completed_value(), queue.last_signaled_value());
}

#[test]
fn test_empty_sync_is_a_full_flush() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    recorder.begin().unwrap();
    recorder.push_completion(tracker(&order, 1));
    queue.submit(&mut recorder).unwrap();

    queue.sync_and_run_callbacks(Vec::new()).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![1]);
    assert_eq!(queue.pending_count(), 0);
}

// ============================================================================
// Failure mode
// ============================================================================

#[test]
fn test_submission_failure_is_fatal() {
    let h = harness();
    let mut queue = SubmissionQueue::new(h.device.clone());
    let mut recorder = CommandRecorder::new(&h.device).unwrap();

    recorder.begin().unwrap();
    *h.fail_next_submit.lock().unwrap() = true;
    assert!(queue.submit(&mut recorder).is_err());
    // Nothing was enqueued; no retry happens.
    assert_eq!(queue.pending_count(), 0);
}
