//! Run a child process with a deadline and bounded output capture.

use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long a killed child's pipes get to flush before the readers are
/// abandoned.
const READER_GRACE: Duration = Duration::from_millis(100);

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub truncated_bytes: usize,
    pub timed_out: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// `None` marks end of stream.
type Chunk = (Stream, Option<Vec<u8>>);

/// Spawn `cmd`, wait at most `timeout`, and keep at most `limit` bytes of
/// each stream.
///
/// Pipes are drained on reader threads so a chatty child cannot block on a
/// full pipe. A child that overruns the deadline is killed. Output is only
/// collected until the deadline: a background grandchild that inherited the
/// pipes keeps its reader thread alive, but not the caller.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = cmd.spawn().context("spawn")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let (tx, rx) = mpsc::channel();
    spawn_reader(stdout, Stream::Stdout, tx.clone());
    spawn_reader(stderr, Stream::Stderr, tx);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for child")? {
        Some(status) => status,
        None => {
            warn!("child overran its deadline, killing");
            timed_out = true;
            child.kill().context("kill child")?;
            child.wait().context("reap killed child")?
        }
    };

    let deadline = (started + timeout).max(Instant::now() + READER_GRACE);
    let mut out = Capture::new(limit);
    let mut err = Capture::new(limit);
    let mut open = 2;
    while open > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, Some(bytes))) => out.push(&bytes),
            Ok((Stream::Stderr, Some(bytes))) => err.push(&bytes),
            Ok((_, None)) => open -= 1,
            Err(RecvTimeoutError::Timeout) => {
                warn!(open, "child output still open past the deadline, abandoning readers");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let truncated_bytes = out.dropped + err.dropped;
    if truncated_bytes > 0 {
        warn!(truncated_bytes, "child output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(ProcessOutput {
        status,
        stdout: out.kept,
        stderr: err.kept,
        truncated_bytes,
        timed_out,
    })
}

/// Forward chunks from `reader` until EOF, a read error, or the receiver
/// going away.
fn spawn_reader<R: Read + Send + 'static>(mut reader: R, stream: Stream, tx: Sender<Chunk>) {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, Some(chunk[..n].to_vec()))).is_err() {
                        return;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(?stream, %err, "reading child output failed");
                    break;
                }
            }
        }
        let _ = tx.send((stream, None));
    });
}

/// Keeps the first `limit` bytes of a stream and counts the rest.
#[derive(Debug)]
struct Capture {
    kept: Vec<u8>,
    dropped: usize,
    limit: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            kept: Vec::new(),
            dropped: 0,
            limit,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.kept.len());
        let keep = bytes.len().min(room);
        self.kept.extend_from_slice(&bytes[..keep]);
        self.dropped += bytes.len() - keep;
    }
}
