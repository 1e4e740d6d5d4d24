//! Pseudo-terminal sessions for children that only report progress on a TTY.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use log::{debug, warn};
use nix::pty::{OpenptyResult, Winsize, openpty};
use nix::sys::termios::Termios;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::process::{Child, Command};

use super::aggregator::OutputAggregator;
use super::runner::{Delivery, READ_BUFFER_SIZE, finish, join_reader};
use super::types::{ChunkSender, ProcessResult};

pub(crate) async fn run(
    program: &Path,
    args: &[String],
    chunks: Option<ChunkSender>,
    echo: bool,
) -> ProcessResult {
    let OpenptyResult { master, slave } = match openpty(None::<&Winsize>, None::<&Termios>) {
        Ok(pty) => pty,
        Err(errno) => {
            let e = io::Error::from(errno);
            warn!("Failed to allocate a pseudo-terminal: {e}");
            return ProcessResult::spawn_failure(&e);
        }
    };

    let spawned = spawn_on_slave(program, args, &slave);
    // The parent must not keep the slave open, otherwise reads on the master
    // never see end-of-stream once the child exits.
    drop(slave);

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to start {}: {e}", program.display());
            return ProcessResult::spawn_failure(&e);
        }
    };

    let master = match async_master(master) {
        Ok(master) => master,
        Err(e) => {
            warn!("Failed to watch pseudo-terminal: {e}");
            let _ = child.start_kill();
            return ProcessResult::spawn_failure(&e);
        }
    };

    let aggregator = Arc::new(OutputAggregator::new());
    let delivery = Delivery::new(aggregator.clone(), chunks, false, echo);
    let reader = tokio::spawn(read_master(master, delivery));

    let status = child.wait().await;
    let tail = join_reader(Some(reader)).await;
    let (stdout, stderr) = aggregator.flush(&tail, &[]);

    finish(program, status, stdout, stderr)
}

/// Spawn with stdin, stdout and stderr all bound to the slave.
///
/// The `Command` holds duplicates of the slave descriptor; it is dropped when
/// this function returns so only the child keeps the slave open.
fn spawn_on_slave(program: &Path, args: &[String], slave: &OwnedFd) -> io::Result<Child> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::from(slave.try_clone()?))
        .stdout(Stdio::from(slave.try_clone()?))
        .stderr(Stdio::from(slave.try_clone()?))
        .kill_on_drop(true);
    command.spawn()
}

fn async_master(master: OwnedFd) -> io::Result<AsyncFd<File>> {
    set_nonblocking(&master)?;
    AsyncFd::with_interest(File::from(master), Interest::READABLE)
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` belongs to `fd`, which stays open for both calls.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only the O_NONBLOCK status flag changes.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

async fn read_master(master: AsyncFd<File>, mut delivery: Delivery) -> Vec<u8> {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let mut guard = match master.readable().await {
            Ok(guard) => guard,
            Err(e) => {
                debug!("Pseudo-terminal readiness failed: {e}");
                break;
            }
        };

        match guard.try_io(|inner| inner.get_ref().read(&mut buf)) {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => delivery.deliver(&buf[..n]),
            // Linux reports EIO on the master once every slave handle is closed.
            Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => break,
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Ok(Err(e)) => {
                debug!("Pseudo-terminal read ended with error: {e}");
                break;
            }
            Err(_would_block) => continue,
        }
    }
    delivery.finish()
}
