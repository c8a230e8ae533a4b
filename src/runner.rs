//! External tool execution
//!
//! The engine shells out in two places: the external export/import mechanism
//! behind `backup::ExternalExport`, and command-shaped compensating actions
//! during undo. All of it goes through `run_tool` so the calling contract is
//! in one place:
//!
//! - **The exit status is the only success signal.** The privileged
//!   export/import tool is known to write benign diagnostic text to stderr
//!   even on success, so "stderr is empty" must never be used to detect
//!   success. Stderr is captured for logging only.
//! - Every invocation runs under a bounded timeout; on expiry the child is
//!   killed and the invocation reports failure.

// Library API - stdout capture is consumed by embedding callers
#![allow(dead_code)]

use crate::error::{Result, TweakError};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default ceiling for one external invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the runner polls a child for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One external command to run.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Output from a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error. Diagnostic only; may be non-empty on success.
    pub stderr: String,
    /// Exit code (None if terminated by signal or killed on timeout).
    pub exit_code: Option<i32>,
    /// Whether the tool exited with status zero.
    pub success: bool,
}

impl ToolOutput {
    /// Check that the tool succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.map_or("signal".to_string(), |c| c.to_string());
            Err(TweakError::tool(format!(
                "{} failed (exit {}): {}",
                context,
                code,
                self.stderr.trim()
            )))
        }
    }
}

/// Execute an external tool and wait for it within the invocation's timeout.
///
/// On timeout the child is killed and the result reports failure with no
/// exit code. Spawn failures (program not found, permissions) are errors;
/// a non-zero exit is not, callers decide via `success`/`ensure_success`.
pub fn run_tool(invocation: &ToolInvocation) -> Result<ToolOutput> {
    log::debug!(
        "run_tool: {} {:?} (timeout {:?})",
        invocation.program,
        invocation.args,
        invocation.timeout
    );

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            TweakError::tool(format!("failed to spawn {}: {}", invocation.program, e))
        })?;

    // Drain both pipes on background threads so a chatty child can never
    // fill a pipe buffer and wedge the poll loop below.
    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let status = wait_with_deadline(&mut child, invocation.timeout)?;

    let stdout = join_pipe(stdout_handle);
    let stderr = join_pipe(stderr_handle);

    match status {
        Some(status) => {
            let success = status.success();
            if !success {
                log::debug!(
                    "{} exited with {:?}, stderr: {}",
                    invocation.program,
                    status.code(),
                    stderr.trim()
                );
            } else if !stderr.trim().is_empty() {
                // Success with stderr noise is expected from the export tool
                log::trace!(
                    "{} succeeded with stderr output: {}",
                    invocation.program,
                    stderr.trim()
                );
            }
            Ok(ToolOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                success,
            })
        }
        None => {
            log::warn!(
                "{} exceeded {:?}, killed",
                invocation.program,
                invocation.timeout
            );
            Ok(ToolOutput {
                stdout,
                stderr,
                exit_code: None,
                success: false,
            })
        }
    }
}

/// Poll the child until it exits or the deadline passes. Returns `None` on
/// timeout (child killed and reaped).
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    // Best effort; the child may have exited in the meantime
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(TweakError::tool(format!("wait failed: {}", e))),
        }
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf);
            buf
        })
    })
}

fn join_pipe(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_despite_stderr_noise() {
        // The export tool writes diagnostics to stderr even on success;
        // only the exit status may decide the outcome.
        let inv = ToolInvocation::new(
            "sh",
            vec!["-c".into(), "echo noise >&2; exit 0".into()],
        );
        let out = run_tool(&inv).unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stderr.trim(), "noise");
        assert!(out.ensure_success("export").is_ok());
    }

    #[test]
    fn test_failure_despite_clean_stderr() {
        let inv = ToolInvocation::new("sh", vec!["-c".into(), "exit 3".into()]);
        let out = run_tool(&inv).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert!(out.ensure_success("import").is_err());
    }

    #[test]
    fn test_timeout_kills_child() {
        let inv = ToolInvocation::new("sh", vec!["-c".into(), "sleep 30".into()])
            .with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let out = run_tool(&inv).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let inv = ToolInvocation::new("definitely-not-a-real-tool-xyz", vec![]);
        assert!(run_tool(&inv).is_err());
    }
}
