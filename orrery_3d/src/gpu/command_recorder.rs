/// CommandRecorder - a reusable command list plus the completion callbacks
/// attached to its in-flight submission.
///
/// Callbacks queue up during recording and are handed to the
/// SubmissionQueue at submit time; they run only once the GPU has finished
/// the submission. Deferred state mutation (residency transitions, upload
/// completion) rides on this queue.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::graphics_device::{CommandList, GraphicsDevice};
use crate::render_bail;

/// A zero-argument deferred effect run after GPU completion
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Records GPU commands into a reusable command list
pub struct CommandRecorder {
    commands: Box<dyn CommandList>,
    completions: Vec<CompletionCallback>,
    recording: bool,
}

impl CommandRecorder {
    pub fn new(device: &Arc<Mutex<dyn GraphicsDevice>>) -> Result<Self> {
        let commands = device.lock().unwrap().create_command_list()?;
        Ok(Self {
            commands,
            completions: Vec::new(),
            recording: false,
        })
    }

    /// Start recording, discarding previously recorded commands
    pub fn begin(&mut self) -> Result<()> {
        if self.recording {
            render_bail!("orrery3d::CommandRecorder", "begin while already recording");
        }
        self.commands.begin()?;
        self.recording = true;
        Ok(())
    }

    /// Finish recording
    pub fn end(&mut self) -> Result<()> {
        if !self.recording {
            render_bail!("orrery3d::CommandRecorder", "end without begin");
        }
        self.commands.end()?;
        self.recording = false;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The command list being recorded into
    pub fn commands_mut(&mut self) -> &mut dyn CommandList {
        self.commands.as_mut()
    }

    /// The recorded command list, for submission
    pub fn command_list(&self) -> &dyn CommandList {
        self.commands.as_ref()
    }

    /// Attach a callback to this recording's eventual submission
    pub fn push_completion(&mut self, callback: CompletionCallback) {
        self.completions.push(callback);
    }

    /// Number of callbacks currently attached
    pub fn completion_count(&self) -> usize {
        self.completions.len()
    }

    /// Hand the attached callbacks to the submission (FIFO order preserved)
    pub fn take_completions(&mut self) -> Vec<CompletionCallback> {
        std::mem::take(&mut self.completions)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "command_recorder_tests.rs"]
mod tests;
