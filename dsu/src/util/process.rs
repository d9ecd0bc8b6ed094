//! Shell command execution for privileged collaborators.

use dsu_shared::errors::{DsuError, DsuResult};
use std::process::{Command, Stdio};

/// Captured result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` through `shell -c`, waiting for it to exit.
///
/// # Returns
/// * `Ok(ShellOutput)` - The command ran; check `success` for its exit status
/// * `Err(...)` - The shell could not be spawned
pub fn run_shell(shell: &str, command: &str) -> DsuResult<ShellOutput> {
    tracing::debug!(shell = %shell, command = %command, "Running shell command");

    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);

    // Pass RUST_LOG through so helper binaries log at the same level
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        cmd.env("RUST_LOG", rust_log);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().map_err(|e| {
        let err_msg = format!("Failed to spawn {} for `{}`: {}", shell, command, e);
        tracing::error!("{}", err_msg);
        DsuError::Internal(err_msg)
    })?;

    let result = ShellOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    tracing::debug!(
        command = %command,
        code = ?result.code,
        stdout = %result.stdout,
        stderr = %result.stderr,
        "Shell command finished"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_shell_success() {
        let out = run_shell("sh", "echo hello").unwrap();
        assert!(out.success);
        assert_eq!(out.code, Some(0));
        assert_eq!(out.stdout, "hello");
    }

    #[test]
    fn test_run_shell_failure_status() {
        let out = run_shell("sh", "echo oops >&2; exit 3").unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stderr, "oops");
    }

    #[test]
    fn test_run_shell_missing_shell() {
        let err = run_shell("/nonexistent/shell", "true").unwrap_err();
        assert!(matches!(err, DsuError::Internal(_)));
    }
}
