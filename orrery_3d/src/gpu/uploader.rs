/// Uploader - single-producer staging pipeline for CPU -> GPU copies.
///
/// Pending copy requests are serialized through a FIFO and drained one per
/// tick using a reusable host-visible staging buffer. At most one upload is
/// in flight at any instant; a tick either starts the next transfer or
/// retires the one in flight, never both. The trade is throughput for
/// determinism: upload completion order always equals enqueue order, and
/// the staging buffer can be reallocated safely because nothing else can be
/// using it while the pipeline is idle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::graphics_device::{BufferUsage, GraphicsDevice};
use crate::gpu::command_recorder::CommandRecorder;
use crate::gpu::resource::{GpuResource, ResourcePayload, UploadState};
use crate::gpu::submission_queue::SubmissionQueue;
use crate::render_debug;

/// Minimum staging allocation; smaller requests share it
const STAGING_FLOOR: u64 = 64 * 1024;

/// One pending CPU -> GPU copy.
///
/// The source bytes are shared-owned with the CPU-side mesh/image, so they
/// stay valid until the command is consumed regardless of what the caller
/// does in the meantime. Consumed exactly once; never retried.
pub struct UploadCommand {
    pub target: Arc<GpuResource>,
    pub data: Arc<[u8]>,
    pub dst_stride: u32,
}

enum UploadPhase {
    Idle,
    Submitted { fence_value: u64 },
}

/// Serializes upload requests and drains them one per tick
pub struct Uploader {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    queue: VecDeque<UploadCommand>,
    staging: Option<Arc<GpuResource>>,
    recorder: CommandRecorder,
    phase: UploadPhase,
}

impl Uploader {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Result<Self> {
        let recorder = CommandRecorder::new(&device)?;
        Ok(Self {
            device,
            queue: VecDeque::new(),
            staging: None,
            recorder,
            phase: UploadPhase::Idle,
        })
    }

    /// Append a copy request to the FIFO and mark the target `Enqueued`.
    ///
    /// Never starts a transfer by itself; draining happens in `update`.
    pub fn enqueue_upload(&mut self, target: Arc<GpuResource>, data: Arc<[u8]>, dst_stride: u32) {
        target.set_upload_state(UploadState::Enqueued);
        self.queue.push_back(UploadCommand {
            target,
            data,
            dst_stride,
        });
    }

    /// Number of requests waiting in the FIFO (not counting one in flight)
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether a transfer is currently in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, UploadPhase::Submitted { .. })
    }

    /// Current staging buffer capacity in bytes (0 before first use)
    pub fn staging_capacity(&self) -> u64 {
        self.staging.as_ref().map_or(0, |staging| staging.byte_len())
    }

    /// One non-blocking pipeline tick.
    ///
    /// While a transfer is in flight this only checks the fence: if the GPU
    /// has reached it, the deferred callbacks run (marking the target
    /// `Uploaded`) and the pipeline returns to idle; otherwise it returns
    /// immediately without draining further commands. When idle, the next
    /// FIFO entry (if any) is recorded and submitted.
    pub fn update(&mut self, submissions: &mut SubmissionQueue) -> Result<()> {
        match self.phase {
            UploadPhase::Submitted { fence_value } => {
                if submissions.completed_value() >= fence_value {
                    submissions.run_completed_callbacks();
                    self.phase = UploadPhase::Idle;
                }
                Ok(())
            }
            UploadPhase::Idle => {
                let Some(command) = self.queue.pop_front() else {
                    return Ok(());
                };
                let fence_value = self.start_transfer(command, submissions)?;
                self.phase = UploadPhase::Submitted { fence_value };
                Ok(())
            }
        }
    }

    fn start_transfer(
        &mut self,
        command: UploadCommand,
        submissions: &mut SubmissionQueue,
    ) -> Result<u64> {
        let staging = self.ensure_staging_capacity(command.data.len() as u64)?;
        staging.map_copy_unmap(&command.data, 1)?;
        let staging_buffer = staging
            .buffer()
            .expect("staging resource is always a buffer")
            .clone();

        self.recorder.begin()?;
        match command.target.payload() {
            ResourcePayload::Buffer(dst) => {
                self.recorder.commands_mut().copy_buffer(
                    staging_buffer.as_ref(),
                    0,
                    dst.as_ref(),
                    0,
                    command.data.len() as u64,
                )?;
            }
            ResourcePayload::Texture(dst) => {
                self.recorder
                    .commands_mut()
                    .copy_buffer_to_texture(staging_buffer.as_ref(), 0, dst.as_ref())?;
            }
        }

        let weak = Arc::downgrade(&command.target);
        self.recorder.push_completion(Box::new(move || {
            if let Some(target) = weak.upgrade() {
                target.set_upload_state(UploadState::Uploaded);
            }
        }));

        submissions.submit(&mut self.recorder)
    }

    /// Grow (never shrink) the staging buffer to hold `needed` bytes.
    ///
    /// Safe to reallocate here: the pipeline is idle, and with a single
    /// upload in flight at a time no submission can still reference the old
    /// allocation.
    fn ensure_staging_capacity(&mut self, needed: u64) -> Result<Arc<GpuResource>> {
        let current = self.staging_capacity();
        if needed > current {
            let capacity = needed.next_power_of_two().max(STAGING_FLOOR);
            render_debug!(
                "orrery3d::Uploader",
                "growing staging buffer {} -> {} bytes",
                current,
                capacity
            );
            self.staging = Some(GpuResource::host_visible_buffer(
                &self.device,
                capacity,
                1,
                BufferUsage::TRANSFER_SRC,
            )?);
        }
        Ok(self.staging.as_ref().unwrap().clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "uploader_tests.rs"]
mod tests;
