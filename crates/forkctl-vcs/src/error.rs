//! Error types for VCS operations.
//!
//! [`VcsError`] is the single error type returned by all [`VcsDriver`](crate::VcsDriver)
//! methods. It uses rich enum variants so callers can match on specific failure
//! modes without parsing error messages.

use thiserror::Error;

/// Errors returned by [`VcsDriver`](crate::VcsDriver) operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// A requested ref, revision, or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A subprocess (`git ...`) exited with a nonzero status.
    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        /// The command line that was run, joined with spaces.
        command: String,
        /// The process exit code, if the process ran at all.
        code: Option<i32>,
        /// Trimmed stderr output.
        stderr: String,
    },

    /// An I/O error occurred spawning or communicating with a subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_message_includes_stderr_and_code() {
        let err = VcsError::CommandFailed {
            command: "git merge --no-ff -m x deadbeef".to_owned(),
            code: Some(1),
            stderr: "CONFLICT (content): Merge conflict in a.txt".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("exit Some(1)"));
        assert!(text.contains("CONFLICT"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "git not on PATH");
        let err: VcsError = io_err.into();
        assert!(matches!(err, VcsError::Io(_)));
    }
}
