//! Process execution request/response types.

use tokio::sync::mpsc;

/// How the child's output is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// stdout and stderr on separate pipes.
    Piped,
    /// All three standard streams bound to a pseudo-terminal slave.
    PseudoTerminal,
}

/// Final outcome of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    /// Result reported when the child could not be started at all.
    pub fn spawn_failure(error: &std::io::Error) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: error.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A piece of output delivered while the child is still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    pub is_error_stream: bool,
}

/// Channel the runner pushes [`StreamChunk`]s into.
pub type ChunkSender = mpsc::UnboundedSender<StreamChunk>;

/// Accumulates bytes and releases only whole UTF-8 sequences.
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Push freshly read bytes and return the decodable prefix.
    ///
    /// An incomplete multi-byte sequence at the end stays pending until the
    /// next read; invalid bytes in the middle are replaced.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(_) => std::mem::take(&mut self.pending),
            Err(e) if e.error_len().is_none() => {
                let tail = self.pending.split_off(e.valid_up_to());
                std::mem::replace(&mut self.pending, tail)
            }
            Err(_) => std::mem::take(&mut self.pending),
        }
    }

    /// Bytes still waiting for the rest of their sequence.
    pub(crate) fn finish(self) -> Vec<u8> {
        self.pending
    }
}
