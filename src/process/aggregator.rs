//! Shared accumulator for a child's output streams.

use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Buffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Thread-safe byte accumulator written by the stream readers and drained
/// once by the caller awaiting the child.
///
/// Both streams sit behind one lock, so appends from different reader tasks
/// and the final flush never interleave within a single call.
#[derive(Debug, Default)]
pub struct OutputAggregator {
    buffers: Mutex<Buffers>,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // A reader that panicked mid-append leaves whole byte slices behind.
        self.buffers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append_stdout(&self, bytes: &[u8]) {
        self.lock().stdout.extend_from_slice(bytes);
    }

    pub fn append_stderr(&self, bytes: &[u8]) {
        self.lock().stderr.extend_from_slice(bytes);
    }

    /// Append whatever the readers still held back, then take both streams.
    ///
    /// The tails are bytes that never formed a complete UTF-8 sequence; they
    /// are decoded lossily along with the rest of the history.
    pub fn flush(&self, stdout_tail: &[u8], stderr_tail: &[u8]) -> (String, String) {
        let mut buffers = self.lock();
        buffers.stdout.extend_from_slice(stdout_tail);
        buffers.stderr.extend_from_slice(stderr_tail);

        let stdout = std::mem::take(&mut buffers.stdout);
        let stderr = std::mem::take(&mut buffers.stderr);
        (
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        )
    }
}
