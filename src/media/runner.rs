//! Child process execution with a hard timeout

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Longest stderr excerpt carried in user-facing errors
pub const DIAGNOSTIC_TAIL_CHARS: usize = 500;

/// Captured output of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Bounded tail of stderr with the given paths reduced to their file names.
    pub fn diagnostics(&self, hide: &[&Path]) -> String {
        let mut text = self.stderr.clone();
        for path in hide {
            let full = path.display().to_string();
            if !full.is_empty() {
                text = text.replace(&full, &super::display_name(path));
            }
        }
        stderr_tail(&text, DIAGNOSTIC_TAIL_CHARS)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
///
/// The child is spawned with `kill_on_drop`, so dropping the returned future
/// (timeout or caller cancellation) terminates the process.
pub async fn run_with_timeout(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<ProcessOutput, RunError> {
    let name = super::display_name(program);

    tracing::debug!(
        "Running {} {} (timeout: {}s)",
        name,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" "),
        timeout.as_secs()
    );

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: name.clone(),
            source,
        })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(RunError::Wait {
            program: name,
            source,
        }),
        Err(_) => {
            tracing::warn!("{} timed out after {}s, killed", name, timeout.as_secs());
            Err(RunError::TimedOut {
                program: name,
                timeout,
            })
        }
    }
}

/// Last `max_chars` characters of trimmed process output.
pub fn stderr_tail(stderr: &str, max_chars: usize) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }

    let start = trimmed
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}
