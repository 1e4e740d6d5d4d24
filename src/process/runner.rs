//! Production command runner backed by tokio child processes.

use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::CommandRunner;
use super::aggregator::OutputAggregator;
use super::types::{ChunkSender, OutputMode, ProcessResult, StreamChunk, Utf8Carry};

pub(crate) const READ_BUFFER_SIZE: usize = 8192;

/// Runs real subprocesses, echoing their output to this process's own
/// standard streams as it arrives.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    echo: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self { echo: true }
    }

    /// Enable or disable echoing child output to our stdout/stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    async fn run_piped(
        &self,
        program: &Path,
        args: &[String],
        chunks: Option<ChunkSender>,
    ) -> ProcessResult {
        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {e}", program.display());
                return ProcessResult::spawn_failure(&e);
            }
        };

        let aggregator = Arc::new(OutputAggregator::new());
        let stdout_reader = child.stdout.take().map(|stdout| {
            let delivery = Delivery::new(aggregator.clone(), chunks.clone(), false, self.echo);
            tokio::spawn(read_to_end(stdout, delivery))
        });
        let stderr_reader = child.stderr.take().map(|stderr| {
            let delivery = Delivery::new(aggregator.clone(), chunks.clone(), true, self.echo);
            tokio::spawn(read_to_end(stderr, delivery))
        });
        drop(chunks);

        let status = child.wait().await;

        // Readers run to end-of-stream, so nothing written just before exit
        // is lost between the last read and the wait.
        let stdout_tail = join_reader(stdout_reader).await;
        let stderr_tail = join_reader(stderr_reader).await;
        let (stdout, stderr) = aggregator.flush(&stdout_tail, &stderr_tail);

        finish(program, status, stdout, stderr)
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        mode: OutputMode,
        chunks: Option<ChunkSender>,
    ) -> ProcessResult {
        debug!("Running {} {:?} ({:?})", program.display(), args, mode);
        match mode {
            OutputMode::Piped => self.run_piped(program, args, chunks).await,
            #[cfg(unix)]
            OutputMode::PseudoTerminal => super::pty::run(program, args, chunks, self.echo).await,
            #[cfg(not(unix))]
            OutputMode::PseudoTerminal => {
                warn!("Pseudo-terminals are unavailable on this platform, using pipes");
                self.run_piped(program, args, chunks).await
            }
        }
    }
}

/// Routes freshly read bytes to the echo stream, the aggregator and the
/// chunk channel, in that order.
pub(crate) struct Delivery {
    aggregator: Arc<OutputAggregator>,
    chunks: Option<ChunkSender>,
    is_error_stream: bool,
    echo: bool,
    carry: Utf8Carry,
}

impl Delivery {
    pub(crate) fn new(
        aggregator: Arc<OutputAggregator>,
        chunks: Option<ChunkSender>,
        is_error_stream: bool,
        echo: bool,
    ) -> Self {
        Self {
            aggregator,
            chunks,
            is_error_stream,
            echo,
            carry: Utf8Carry::default(),
        }
    }

    pub(crate) fn deliver(&mut self, bytes: &[u8]) {
        if self.echo {
            echo(bytes, self.is_error_stream);
        }

        let complete = self.carry.push(bytes);
        if complete.is_empty() {
            return;
        }

        if self.is_error_stream {
            self.aggregator.append_stderr(&complete);
        } else {
            self.aggregator.append_stdout(&complete);
        }

        if let Some(tx) = &self.chunks {
            // The consumer may have gone away; output is still aggregated.
            let _ = tx.send(StreamChunk {
                text: String::from_utf8_lossy(&complete).into_owned(),
                is_error_stream: self.is_error_stream,
            });
        }
    }

    /// Bytes held back waiting for the rest of a UTF-8 sequence.
    pub(crate) fn finish(self) -> Vec<u8> {
        self.carry.finish()
    }
}

fn echo(bytes: &[u8], is_error_stream: bool) {
    if is_error_stream {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(bytes);
        let _ = stderr.flush();
    } else {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
    }
}

async fn read_to_end<R>(mut reader: R, mut delivery: Delivery) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => delivery.deliver(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Stream read ended with error: {e}");
                break;
            }
        }
    }
    delivery.finish()
}

pub(crate) async fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match reader {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            warn!("Output reader task failed: {e}");
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// Assemble the final result once the child and its readers are done.
pub(crate) fn finish(
    program: &Path,
    status: std::io::Result<ExitStatus>,
    stdout: String,
    mut stderr: String,
) -> ProcessResult {
    let exit_code = match status {
        Ok(status) => exit_code(status),
        Err(e) => {
            warn!("Failed to wait for {}: {e}", program.display());
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&e.to_string());
            -1
        }
    };
    debug!(
        "{} exited with {exit_code} ({} bytes stdout, {} bytes stderr)",
        program.display(),
        stdout.len(),
        stderr.len()
    );
    ProcessResult {
        exit_code,
        stdout,
        stderr,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
