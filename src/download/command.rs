//! Running external download tools.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::DownloadError;

/// Longest stderr excerpt carried in an error.
const STDERR_LIMIT: usize = 600;

/// Run `program` with `args` inside `cwd`, waiting at most `timeout`.
///
/// The working directory is set on the child only, never on this process.
/// The child is killed if the timeout fires.
pub async fn run<I, S>(program: &str, args: I, cwd: &Path, timeout: Duration) -> Result<(), DownloadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", command.as_std());

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| DownloadError::Timeout(timeout))??;

    if output.status.success() {
        return Ok(());
    }

    Err(DownloadError::ProcessFailed {
        program: program.to_string(),
        status: output.status,
        stderr: excerpt(&String::from_utf8_lossy(&output.stderr)),
    })
}

/// Last `STDERR_LIMIT` characters of trimmed output; tools print the cause last.
fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_LIMIT {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - STDERR_LIMIT).collect();
    format!("…{tail}")
}
