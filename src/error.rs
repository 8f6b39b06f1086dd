use thiserror::Error;

/// Failures a backup run can surface. The core never retries and never
/// swallows: every variant propagates to the orchestrator, which logs and
/// sets the process exit status.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The external list/dump tool could not be started or exited non-zero.
    /// `code` is `None` when the process was killed by a signal.
    #[error("{command} failed with exit code {}", .code.map_or_else(|| "unknown (signal)".to_string(), |c| c.to_string()))]
    ExternalTool { command: String, code: Option<i32> },

    /// The run was interrupted; the child process has already been killed
    /// by the time this surfaces.
    #[error("dump cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Wrap a spawn failure so the error names the executable that was
    /// being launched rather than a bare ENOENT.
    pub(crate) fn spawn(command: &str, err: std::io::Error) -> Self {
        BackupError::Io(std::io::Error::new(
            err.kind(),
            format!("failed to start {command}: {err}"),
        ))
    }
}
