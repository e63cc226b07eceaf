//! Bounded subprocess execution.
//!
//! Every external call the engine makes (script runners, the automation
//! bridge, the host executable, the readiness query) goes through
//! `run_with_timeout`, which captures output and kills the child when the
//! deadline passes. Callers are suspended only for the bounded duration.

use crate::error::{RelayError, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of running one external command.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code of the process (None if killed or terminated by a signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Whether the process was killed because it ran past its deadline.
    pub timed_out: bool,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// One-line summary for diagnostics: exit status plus trimmed stderr.
    pub fn summary(&self) -> String {
        let status = if self.timed_out {
            format!("timed out after {:.1}s", self.duration.as_secs_f64())
        } else {
            match self.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            }
        };

        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, first_line(stderr))
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

/// Run `program args...` with stdin closed, capturing stdout and stderr.
///
/// Returns `Err` only if the process could not be started; a non-zero exit
/// or a timeout is reported through `ProcessOutcome`.
pub fn run_with_timeout(program: &str, args: &[String], timeout: Duration) -> Result<ProcessOutcome> {
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            RelayError::UserError(format!(
                "failed to execute '{}': {}\n\
                 Fix: ensure the program is installed and the path is correct.",
                program, e
            ))
        })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;
    let duration = start.elapsed();

    // A killed child may leave grandchildren holding the pipes open, so
    // readers are only joined when the child exited on its own.
    let (stdout, stderr) = if timed_out {
        (String::new(), String::new())
    } else {
        (join_reader(stdout_reader), join_reader(stderr_reader))
    };

    tracing::debug!(
        program,
        exit_code = ?exit_code,
        timed_out,
        elapsed_ms = duration.as_millis() as u64,
        "external command finished"
    );

    Ok(ProcessOutcome {
        exit_code,
        stdout,
        stderr,
        duration,
        timed_out,
    })
}

/// Split a rendered argv into program and arguments and run it.
pub fn run_argv(argv: &[String], timeout: Duration) -> Result<ProcessOutcome> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| RelayError::UserError("command is empty".to_string()))?;
    run_with_timeout(program, args, timeout)
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Wait for a child process with timeout.
///
/// Returns (exit_code, timed_out).
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status.code(), false)),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process(child);
                    return Ok((None, true));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_process(child);
                return Err(RelayError::UserError(format!(
                    "failed to check process status: {}",
                    e
                )));
            }
        }
    }
}

/// Kill a process and reap it.
fn kill_process(child: &mut Child) {
    // On Unix this is SIGKILL; on Windows it is TerminateProcess.
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_stdout_on_success() {
        let outcome = run_with_timeout("sh", &sh("echo 24.1"), Duration::from_secs(10)).unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.stdout.trim(), "24.1");
        assert_eq!(outcome.summary(), "exit code 0");
    }

    #[test]
    fn test_nonzero_exit_with_stderr() {
        let outcome = run_with_timeout(
            "sh",
            &sh("echo 'menu item not found' >&2; exit 1"),
            Duration::from_secs(10),
        )
        .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.timed_out);
        assert_eq!(outcome.summary(), "exit code 1: menu item not found");
    }

    #[test]
    fn test_timeout_kills_process() {
        let start = Instant::now();
        let outcome = run_with_timeout("sleep", &["10".to_string()], Duration::from_millis(300)).unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.is_success());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(outcome.summary().starts_with("timed out after"));
    }

    #[test]
    fn test_missing_program_is_error() {
        let err = run_with_timeout(
            "/nonexistent/hostrelay-runner-xyz",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to execute"));
    }

    #[test]
    fn test_run_argv_empty_is_error() {
        let err = run_argv(&[], Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.to_string(), "command is empty");
    }

    #[test]
    fn test_run_argv_splits_program() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()];
        assert!(run_argv(&argv, Duration::from_secs(10)).unwrap().is_success());
    }
}
