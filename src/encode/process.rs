use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::foundation::error::{StickerError, StickerResult};

const STDERR_EXCERPT: usize = 500;

/// Run an external tool to completion (or until `timeout`), then check it produced `output`.
///
/// Success means exit status zero and a non-empty file at `output`; the file size is returned.
/// A tool that outlives `timeout` is killed.
pub fn run_tool(mut cmd: Command, output: &Path, timeout: Duration) -> StickerResult<u64> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        StickerError::transcode(format!(
            "failed to spawn {program} (is it installed and on PATH?): {e}"
        ))
    })?;

    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| StickerError::transcode(format!("failed to open {program} stderr")))?;
    let stderr_drain = std::thread::spawn(move || {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).map(|_| buf)
    });

    let waited = child
        .wait_timeout(timeout)
        .map_err(|e| StickerError::transcode(format!("failed to wait for {program}: {e}")))?;
    let status = match waited {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // Grandchildren may still hold stderr open; the drain thread is left to finish alone.
            drop(stderr_drain);
            return Err(StickerError::transcode(format!(
                "{program} timed out after {}s",
                timeout.as_secs_f32()
            )));
        }
    };

    let stderr_bytes = stderr_drain
        .join()
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();

    if !status.success() {
        let text = String::from_utf8_lossy(&stderr_bytes);
        let excerpt: String = text.trim().chars().take(STDERR_EXCERPT).collect();
        return Err(StickerError::transcode(format!(
            "{program} exited with {status}: {excerpt}"
        )));
    }

    let len = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(StickerError::transcode(format!(
            "{program} succeeded but wrote no output to '{}'",
            output.display()
        )));
    }
    debug!(%program, bytes = len, "tool finished");
    Ok(len)
}
