//! The default [`VcsDriver`] implementation — shells out to the `git` binary.
//!
//! Grounded on the subprocess-wrapping style used elsewhere for arbitrary
//! child processes: build the argument vector, set `current_dir`, capture
//! output, and turn a nonzero exit status into a structured error carrying
//! the command line and stderr.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::VcsError;
use crate::types::{CloneFilter, Identity, MergeOutcome};
use crate::driver::VcsDriver;

/// Shells out to a `git` binary found on `PATH`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessVcsDriver;

impl ProcessVcsDriver {
    /// Create a new driver. There is no state to configure — every method
    /// takes the repository path explicitly.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(&self, repo: &Path, args: &[&str]) -> Result<Output, VcsError> {
        self.run_with_identity(repo, args, None)
    }

    fn run_with_identity(
        &self,
        repo: &Path,
        args: &[&str],
        identity: Option<Identity>,
    ) -> Result<Output, VcsError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(repo);
        if let Some(id) = identity {
            let date = format!("{} +0000", id.epoch_secs);
            cmd.env("GIT_AUTHOR_NAME", id.name)
                .env("GIT_AUTHOR_EMAIL", id.email)
                .env("GIT_AUTHOR_DATE", &date)
                .env("GIT_COMMITTER_NAME", id.name)
                .env("GIT_COMMITTER_EMAIL", id.email)
                .env("GIT_COMMITTER_DATE", &date);
        }
        tracing::debug!(?args, dir = %repo.display(), "git");
        let output = cmd.output()?;
        Ok(output)
    }

    fn ensure_success(&self, args: &[&str], output: Output) -> Result<Output, VcsError> {
        if output.status.success() {
            Ok(output)
        } else {
            Err(VcsError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    fn stdout_string(output: &Output) -> String {
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    }
}

impl VcsDriver for ProcessVcsDriver {
    fn clone(&self, url: &str, dest: &Path, filter: CloneFilter) -> Result<(), VcsError> {
        let dest_str = dest.to_string_lossy().into_owned();
        let mut args = vec!["clone"];
        if let Some(arg) = filter.as_arg() {
            args.push(arg);
        }
        args.push(url);
        args.push(&dest_str);
        // Cloning has no existing working directory yet; run from dest's parent.
        let parent = dest.parent().unwrap_or(Path::new("."));
        let output = self.run(parent, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn set_option(&self, repo: &Path, key: &str, value: &str) -> Result<(), VcsError> {
        let args = ["config", key, value];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn fetch_sha(&self, repo: &Path, sha: &str, depth: Option<u32>) -> Result<(), VcsError> {
        let depth_arg;
        let mut args = vec!["fetch"];
        if let Some(d) = depth {
            depth_arg = format!("--depth={d}");
            args.push(&depth_arg);
        }
        args.push("origin");
        args.push(sha);
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn fetch_pr(&self, repo: &Path, n: u64) -> Result<(), VcsError> {
        let refspec = format!("pull/{n}/head:pr-{n}");
        let args = ["fetch", "origin", refspec.as_str()];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsError> {
        let refspec = format!("{branch}:{branch}");
        let args = ["fetch", "origin", refspec.as_str()];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn rev_parse(&self, repo: &Path, revspec: &str) -> Result<String, VcsError> {
        let args = ["rev-parse", revspec];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output))
    }

    fn current_branch(&self, repo: &Path) -> Result<String, VcsError> {
        let args = ["rev-parse", "--abbrev-ref", "HEAD"];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output))
    }

    fn checkout(&self, repo: &Path, revspec: &str) -> Result<(), VcsError> {
        let args = ["checkout", revspec];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn create_branch(&self, repo: &Path, name: &str) -> Result<(), VcsError> {
        let args = ["checkout", "-b", name];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn merge_no_ff(
        &self,
        repo: &Path,
        sha: &str,
        message: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError> {
        let args = ["merge", "--no-ff", "-m", message, sha];
        let output = self.run_with_identity(repo, &args, Some(identity))?;
        if output.status.success() {
            return Ok(MergeOutcome::Ok);
        }
        let unmerged = self.list_unmerged(repo)?;
        if unmerged.is_empty() {
            // Failed for a reason other than conflicts.
            return Err(VcsError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(MergeOutcome::Conflicted { paths: unmerged })
    }

    fn list_unmerged(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let args = ["diff", "--name-only", "--diff-filter=U"];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output)
            .lines()
            .map(str::to_owned)
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn stage_all(&self, repo: &Path) -> Result<(), VcsError> {
        let args = ["add", "-A"];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn write_merge_msg(&self, repo: &Path, message: &str) -> Result<(), VcsError> {
        let git_dir = repo.join(".git");
        std::fs::write(git_dir.join("MERGE_MSG"), message)?;
        Ok(())
    }

    fn merge_continue_noedit(&self, repo: &Path, identity: Identity) -> Result<(), VcsError> {
        let args = ["-c", "core.editor=true", "merge", "--continue"];
        let output = self.run_with_identity(repo, &args, Some(identity))?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn commit(&self, repo: &Path, message: &str, identity: Identity) -> Result<(), VcsError> {
        let args = ["commit", "-m", message];
        let output = self.run_with_identity(repo, &args, Some(identity))?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn apply_patch(&self, repo: &Path, patch_path: &Path) -> Result<(), VcsError> {
        let patch_str = patch_path.to_string_lossy().into_owned();
        let args = ["apply", "--index", patch_str.as_str()];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn diff_quiet(
        &self,
        repo: &Path,
        a: &str,
        b: Option<&str>,
        cached: bool,
    ) -> Result<bool, VcsError> {
        let mut args = vec!["diff", "--quiet"];
        if cached {
            args.push("--cached");
        }
        args.push(a);
        if let Some(b) = b {
            args.push(b);
        }
        let output = self.run(repo, &args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(VcsError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
        }
    }

    fn list_untracked(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let args = ["ls-files", "--others", "--exclude-standard"];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output)
            .lines()
            .map(str::to_owned)
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn stash_list(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let args = ["stash", "list"];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output)
            .lines()
            .map(str::to_owned)
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn log_oneline_range(&self, repo: &Path, a: &str, b: &str) -> Result<Vec<String>, VcsError> {
        let range = format!("{a}..{b}");
        let args = ["log", "--reverse", "--oneline", range.as_str()];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(Self::stdout_string(&output)
            .lines()
            .map(str::to_owned)
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn cherry_pick_range(
        &self,
        repo: &Path,
        a: &str,
        b: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError> {
        let range = format!("{a}..{b}");
        let args = ["cherry-pick", range.as_str()];
        let output = self.run_with_identity(repo, &args, Some(identity))?;
        if output.status.success() {
            return Ok(MergeOutcome::Ok);
        }
        let unmerged = self.list_unmerged(repo)?;
        if unmerged.is_empty() {
            return Err(VcsError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(MergeOutcome::Conflicted { paths: unmerged })
    }

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        let args = ["remote", "add", name, url];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn diff_cached_patch(&self, repo: &Path, base: &str) -> Result<Vec<u8>, VcsError> {
        let args = ["diff", "--cached", base];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        Ok(output.stdout)
    }

    fn reset_hard(&self, repo: &Path, revspec: &str) -> Result<(), VcsError> {
        let args = ["reset", "--hard", revspec];
        let output = self.run(repo, &args)?;
        self.ensure_success(&args, output).map(|_| ())
    }

    fn list_branches(&self, repo: &Path, prefix: &str) -> Result<Vec<String>, VcsError> {
        let pattern = format!("{prefix}*");
        let args = ["branch", "--list", pattern.as_str(), "--format=%(refname:short)"];
        let output = self.run(repo, &args)?;
        let output = self.ensure_success(&args, output)?;
        let mut names: Vec<String> =
            Self::stdout_string(&output).lines().map(str::to_owned).filter(|l| !l.is_empty()).collect();
        names.sort();
        Ok(names)
    }

    fn read_file(&self, repo: &Path, path: &str) -> Result<Vec<u8>, VcsError> {
        Ok(std::fs::read(repo.join(path))?)
    }

    fn write_file(&self, repo: &Path, path: &str, bytes: &[u8]) -> Result<(), VcsError> {
        let full = repo.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }
}
