//! The pluggable post-merge hook: repository-specific post-processing the
//! core treats as opaque (spec.md §1's "any repository-specific
//! post-processing... modeled as a pluggable post-merge hook invoked once").
//!
//! The hook only mutates the working tree; the record/replay engines are
//! responsible for staging and committing under deterministic identity, so
//! no hook implementation can affect commit determinism by choosing its own
//! author/timestamp.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::config::Entry;

/// Invoked once per record/replay, after the merge loop completes and
/// before local patches replay.
pub trait PostMergeHook {
    /// Run the hook against the working tree at `repo`. `merge_count` is the
    /// number of merge steps just replayed, handed through for hooks whose
    /// behavior depends on it (e.g. only acting past a certain step count).
    ///
    /// Returns `true` if the hook mutated the working tree. The engine
    /// double-checks with its own diff before committing, so an
    /// over-eager `true` costs nothing but a no-op diff check.
    fn run(&self, repo: &Path, merge_count: usize) -> Result<bool, HookError>;
}

/// The default hook: does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl PostMergeHook for NoopHook {
    fn run(&self, _repo: &Path, _merge_count: usize) -> Result<bool, HookError> {
        Ok(false)
    }
}

/// Runs an external shell command with the repository as its working
/// directory. **(expansion)** — the core only specifies the trait; this is
/// one concrete way to plug a repository-specific mutation in without
/// recompiling forkctl, grounded on the same "run an arbitrary subprocess
/// and map its exit status" shape used throughout this crate's `VcsDriver`.
#[derive(Clone, Debug)]
pub struct ShellHook {
    /// The command line, passed to `sh -c`.
    pub command: String,
}

impl PostMergeHook for ShellHook {
    fn run(&self, repo: &Path, _merge_count: usize) -> Result<bool, HookError> {
        let output = Command::new("sh").arg("-c").arg(&self.command).current_dir(repo).output()?;
        if !output.status.success() {
            return Err(HookError::CommandFailed {
                command: self.command.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(true)
    }
}

/// Build the hook an entry's configuration calls for: [`ShellHook`] if
/// `entry.hook` names a command, [`NoopHook`] otherwise.
#[must_use]
pub fn from_entry(entry: &Entry) -> Box<dyn PostMergeHook> {
    match &entry.hook {
        Some(command) => Box::new(ShellHook { command: command.clone() }),
        None => Box::new(NoopHook),
    }
}

/// Errors from running a post-merge hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook's external command exited nonzero.
    #[error("post-merge hook `{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// The process exit code, if the process ran at all.
        code: Option<i32>,
        /// Trimmed stderr output.
        stderr: String,
    },

    /// An I/O error occurred spawning the hook.
    #[error("I/O error running post-merge hook: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hook_never_changes_anything() {
        let hook = NoopHook;
        assert!(!hook.run(Path::new("/tmp"), 3).unwrap());
    }

    #[test]
    fn shell_hook_reports_success_as_changed() {
        let hook = ShellHook { command: "true".to_owned() };
        assert!(hook.run(Path::new("/tmp"), 0).unwrap());
    }

    #[test]
    fn shell_hook_surfaces_nonzero_exit() {
        let hook = ShellHook { command: "exit 3".to_owned() };
        let err = hook.run(Path::new("/tmp"), 0).unwrap_err();
        assert!(matches!(err, HookError::CommandFailed { code: Some(3), .. }));
    }

    #[test]
    fn from_entry_defaults_to_noop() {
        let entry = Entry { upstream: "u".to_owned(), fork: None, refs: vec![], workspace: None, hook: None };
        assert!(!from_entry(&entry).run(Path::new("/tmp"), 0).unwrap());
    }

    #[test]
    fn from_entry_builds_shell_hook() {
        let entry = Entry { upstream: "u".to_owned(), fork: None, refs: vec![], workspace: None, hook: Some("true".to_owned()) };
        assert!(from_entry(&entry).run(Path::new("/tmp"), 0).unwrap());
    }
}
