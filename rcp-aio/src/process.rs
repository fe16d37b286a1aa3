// rcp-aio/src/process.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};

use rcp_common::error::Result;
use tokio::process::Command;
use tracing::debug;

/// Runs an external command to completion and captures its output.
///
/// A non-zero exit is not an error here; callers inspect `Output::status`.
/// Spawn failures come back as `RcpError::Io` with the original error kind.
pub async fn run_command_async(
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Option<HashMap<String, String>>,
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>())
    );

    let mut cmd = Command::new(&command);
    cmd.args(&args);
    cmd.kill_on_drop(true);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    let output = cmd.output().await.map_err(|e| {
        debug!("Failed to execute {}: {}", command, e);
        e
    })?;

    if output.status.success() {
        debug!("Command {} finished successfully.", command);
    } else {
        debug!("Command {} failed with status: {}", command, output.status);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("Stdout:\n{}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("Stderr:\n{}", stderr.trim());
        }
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use rcp_common::error::RcpError;

    use super::*;

    #[tokio::test]
    async fn captures_output_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut envs = HashMap::new();
        envs.insert("RCP_PROBE".to_string(), "42".to_string());
        let output = run_command_async(
            "/bin/sh".to_string(),
            vec![
                "-c".to_string(),
                "pwd; echo $RCP_PROBE; exit 3".to_string(),
            ],
            Some(dir.path().to_path_buf()),
            Some(envs),
        )
        .await
        .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.ends_with("42\n"), "stdout was {stdout:?}");
    }

    #[tokio::test]
    async fn missing_program_keeps_io_kind() {
        let err = run_command_async(
            "/definitely/not/a/real/program".to_string(),
            Vec::new(),
            None,
            None,
        )
        .await
        .unwrap_err();
        match err {
            RcpError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
