//! Helpers for running a child process while streaming its output to the console.

use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

use crate::core::stream::LineLabeler;

/// Per-stream line prefixes used when output is labeled.
#[derive(Debug, Clone)]
pub struct StreamLabels {
    pub stdout: String,
    pub stderr: String,
}

/// Captured child process result.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Everything the child wrote to stdout (also streamed to our stdout).
    pub stdout: Vec<u8>,
    /// Wall clock from spawn to exit.
    pub duration: Duration,
}

/// Run a command to completion, streaming its output.
///
/// stdin is inherited so the child can interact with the terminal. stdout is
/// always piped: it is echoed to our stdout and captured. With `labels`, stderr
/// is piped too and both streams are echoed line by line with their prefix;
/// without, stderr is inherited untouched. There is no timeout.
#[instrument(skip_all, fields(labeled = labels.is_some()))]
pub fn run_streaming(mut cmd: Command, labels: Option<StreamLabels>) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::inherit()).stdout(Stdio::piped());
    if labels.is_some() {
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let (stdout_label, stderr_label) = match labels {
        Some(labels) => (Some(labels.stdout), Some(labels.stderr)),
        None => (None, None),
    };

    let stdout_handle = thread::spawn(move || pump(stdout, io::stdout(), stdout_label));
    let stderr_handle = match child.stderr.take() {
        Some(stderr) => Some(thread::spawn(move || pump(stderr, io::stderr(), stderr_label))),
        None => None,
    };

    let status = child.wait().context("wait for command")?;
    let duration = started.elapsed();

    let stdout = join_output(stdout_handle).context("join stdout")?;
    if let Some(handle) = stderr_handle {
        join_output(handle).context("join stderr")?;
    }

    debug!(
        exit_code = ?status.code(),
        duration_ms = duration.as_millis() as u64,
        "command finished"
    );
    Ok(ProcessOutput {
        status,
        stdout,
        duration,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Copy `reader` to `sink` until EOF, optionally labeling each line, and return
/// the raw bytes read.
fn pump<R: Read, W: Write>(mut reader: R, mut sink: W, label: Option<String>) -> Result<Vec<u8>> {
    let mut labeler = label.map(LineLabeler::new);
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
        match labeler.as_mut() {
            Some(labeler) => {
                for line in labeler.push(&chunk[..n]) {
                    emit(&mut sink, line.as_bytes());
                }
            }
            None => emit(&mut sink, &chunk[..n]),
        }
    }

    if let Some(rest) = labeler.and_then(LineLabeler::finish) {
        emit(&mut sink, rest.as_bytes());
    }
    Ok(collected)
}

// The console going away must not stop us from draining the child.
fn emit<W: Write>(sink: &mut W, bytes: &[u8]) {
    if let Err(e) = sink.write_all(bytes).and_then(|()| sink.flush()) {
        warn!(err = %e, "failed to echo child output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_labels_lines_and_flushes_tail() {
        let mut sink = Vec::new();
        let collected = pump(&b"first\nsecond"[..], &mut sink, Some("[Dev] ".to_string()))
            .expect("pump");
        assert_eq!(collected, b"first\nsecond");
        assert_eq!(String::from_utf8(sink).expect("utf8"), "[Dev] first\n[Dev] second\n");
    }

    #[test]
    fn pump_passes_raw_bytes_without_label() {
        let mut sink = Vec::new();
        let collected = pump(&b"raw\npartial"[..], &mut sink, None).expect("pump");
        assert_eq!(collected, b"raw\npartial");
        assert_eq!(sink, b"raw\npartial");
    }

    #[cfg(unix)]
    #[test]
    fn run_streaming_captures_stdout_and_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo REVIEW_PASSED; exit 3");
        let output = run_streaming(cmd, None).expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "REVIEW_PASSED\n");
    }

    #[test]
    fn run_streaming_reports_spawn_failure() {
        let cmd = Command::new("storyloop-definitely-missing-binary");
        let err = run_streaming(cmd, None).unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
