//! Running external tools with captured output and cancellation.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {bin:?}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; `stderr` is the captured standard error, untouched.
    #[error("{status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("canceled")]
    Canceled,
}

/// Runs `bin` with `args`, capturing stdout and stderr.
///
/// The tool runs in its own process group. If `cancel` fires before it
/// exits, the whole group is killed and `partial_output` (if any) is removed
/// before returning [`ToolError::Canceled`].
pub async fn run_tool(
    bin: &Path,
    args: &[OsString],
    cancel: &CancellationToken,
    partial_output: Option<&Path>,
) -> Result<Output, ToolError> {
    if cancel.is_cancelled() {
        return Err(ToolError::Canceled);
    }

    debug!("Running {:?} {:?}", bin, args);
    let mut command = Command::new(bin);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|source| ToolError::Spawn {
        bin: bin.to_string_lossy().to_string(),
        source,
    })?;
    let pid = child.id();

    // Dropping the wait future drops the child, and kill_on_drop kills it
    let output = tokio::select! {
        result = child.wait_with_output() => result.map_err(|source| ToolError::Spawn {
            bin: bin.to_string_lossy().to_string(),
            source,
        })?,
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                kill_group(pid).await;
            }
            if let Some(path) = partial_output {
                remove_partial(path).await;
            }
            return Err(ToolError::Canceled);
        }
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(output)
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
async fn kill_group(pid: u32) {
    let result = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{}", pid))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => debug!("Killed process group {}", pid),
        Ok(status) => warn!("Killing process group {} exited with {}", pid, status),
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
async fn kill_group(_pid: u32) {}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}
