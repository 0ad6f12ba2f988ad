//! FFprobe duration lookup.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Probe a video's container duration in seconds.
///
/// FFprobe prints the bare number on stdout; anything else is reported as
/// [`MediaError::DurationUnavailable`].
pub async fn probe_duration(path: impl AsRef<Path>, cancel: &CancellationToken) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let mut command = Command::new("ffprobe");
    command
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::select! {
        output = command.output() => output?,
        _ = cancel.cancelled() => return Err(MediaError::Cancelled),
    };

    if !output.status.success() {
        return Err(MediaError::DurationUnavailable(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let duration = parse_duration_output(&String::from_utf8_lossy(&output.stdout))?;
    debug!("Probed {}: {:.3}s", path.display(), duration);
    Ok(duration)
}

/// Parse ffprobe's numeric duration output.
pub fn parse_duration_output(stdout: &str) -> MediaResult<f64> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    line.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .ok_or_else(|| MediaError::DurationUnavailable(format!("unparsable output {:?}", line)))
}
