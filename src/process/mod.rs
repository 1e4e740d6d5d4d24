//! Subprocess execution with live output capture.
//!
//! A [`CommandRunner`] starts a program, captures its output either on two
//! pipes or through a pseudo-terminal, forwards [`StreamChunk`]s while the
//! child runs and returns one [`ProcessResult`] at the end. Nothing here
//! knows about speech synthesis.

mod aggregator;
#[cfg(unix)]
mod pty;
mod runner;
mod types;

pub use aggregator::OutputAggregator;
pub use runner::SystemRunner;
pub use types::{ChunkSender, OutputMode, ProcessResult, StreamChunk};

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for running external programs.
///
/// Starting a program never fails from the caller's point of view: a spawn
/// error is reported as exit code 1 with the OS error text on stderr. This
/// is the seam test doubles replace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion.
    ///
    /// # Arguments
    /// * `program` - Executable path or name looked up on `PATH`
    /// * `args` - Arguments passed verbatim
    /// * `mode` - Separate pipes or a merged pseudo-terminal
    /// * `chunks` - Receives output as it arrives; dropped when the run ends
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        mode: OutputMode,
        chunks: Option<ChunkSender>,
    ) -> ProcessResult;
}

/// Run a program and hand every chunk to `on_chunk` on the calling task.
///
/// All chunks are delivered, in arrival order, before the result is
/// returned; `on_chunk` is never invoked concurrently with itself.
pub async fn run_streaming<F>(
    runner: &dyn CommandRunner,
    program: &Path,
    args: &[String],
    mode: OutputMode,
    mut on_chunk: F,
) -> ProcessResult
where
    F: FnMut(StreamChunk),
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = runner.run(program, args, mode, Some(tx));
    let drain = async {
        // Ends once the runner and all of its readers dropped their senders.
        while let Some(chunk) = rx.recv().await {
            on_chunk(chunk);
        }
    };
    let (result, ()) = tokio::join!(run, drain);
    result
}
