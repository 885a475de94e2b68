/// SubmissionQueue - total ordering of command-buffer submissions and
/// CPU-observable completion.
///
/// Owns the monotonically increasing fence counter. Every submission signals
/// a fresh value; completion callbacks registered with a submission never run
/// before the GPU-reported completed value has reached it, and callbacks for
/// an earlier value always run entirely before any callback for a later one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Swapchain};
use crate::gpu::command_recorder::{CommandRecorder, CompletionCallback};
use crate::render_trace;

/// One in-flight submission: its fence value and its deferred effects
struct SubmissionRecord {
    fence_value: u64,
    completions: Vec<CompletionCallback>,
}

/// Owns the fence counter and the FIFO of pending completion callbacks
pub struct SubmissionQueue {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    last_signaled: u64,
    pending: VecDeque<SubmissionRecord>,
}

impl SubmissionQueue {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            last_signaled: 0,
            pending: VecDeque::new(),
        }
    }

    /// Reserve the next fence value. Strictly increasing.
    pub fn signal(&mut self) -> u64 {
        self.last_signaled += 1;
        self.last_signaled
    }

    /// The most recently reserved fence value
    pub fn last_signaled_value(&self) -> u64 {
        self.last_signaled
    }

    /// Highest fence value the GPU has finished
    pub fn completed_value(&self) -> u64 {
        self.device.lock().unwrap().completed_fence_value()
    }

    /// Number of submissions whose callbacks have not yet run
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Submit the recorder's commands, signaling a fresh fence value.
    ///
    /// The recorder's completion callbacks move onto the pending queue.
    /// Submission failure is a fatal device error and is never retried.
    pub fn submit(&mut self, recorder: &mut CommandRecorder) -> Result<u64> {
        recorder.end()?;
        let fence_value = self.signal();
        self.device
            .lock()
            .unwrap()
            .submit(recorder.command_list(), fence_value)?;
        self.pending.push_back(SubmissionRecord {
            fence_value,
            completions: recorder.take_completions(),
        });
        render_trace!("orrery3d::SubmissionQueue", "submitted fence value {}", fence_value);
        Ok(fence_value)
    }

    /// Submit a frame's commands and schedule presentation after them
    pub fn submit_frame(
        &mut self,
        recorder: &mut CommandRecorder,
        swapchain: &dyn Swapchain,
        image_index: u32,
    ) -> Result<u64> {
        recorder.end()?;
        let fence_value = self.signal();
        self.device.lock().unwrap().submit_frame(
            recorder.command_list(),
            fence_value,
            swapchain,
            image_index,
        )?;
        self.pending.push_back(SubmissionRecord {
            fence_value,
            completions: recorder.take_completions(),
        });
        Ok(fence_value)
    }

    /// Run callbacks of every submission the GPU has finished, in FIFO
    /// order. Non-blocking.
    pub fn run_completed_callbacks(&mut self) {
        let completed = self.completed_value();
        while self
            .pending
            .front()
            .is_some_and(|record| record.fence_value <= completed)
        {
            let record = self.pending.pop_front().unwrap();
            for callback in record.completions {
                callback();
            }
        }
    }

    /// Signal a new fence value, block until the GPU reaches it, then run
    /// every outstanding callback in FIFO order.
    ///
    /// `callbacks` are attached to the new value and therefore run last.
    /// Called with an empty list this is a full flush of the queue (used at
    /// end of frame, before a resize, and during teardown).
    pub fn sync_and_run_callbacks(&mut self, callbacks: Vec<CompletionCallback>) -> Result<()> {
        let fence_value = self.signal();
        self.device.lock().unwrap().signal_fence(fence_value)?;
        if !callbacks.is_empty() {
            self.pending.push_back(SubmissionRecord {
                fence_value,
                completions: callbacks,
            });
        }
        self.device.lock().unwrap().wait_for_fence_value(fence_value)?;
        self.run_completed_callbacks();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "submission_queue_tests.rs"]
mod tests;
