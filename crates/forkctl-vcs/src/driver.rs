//! The [`VcsDriver`] trait — the single abstraction boundary between
//! forkctl and git.
//!
//! The record and replay engines interact with git exclusively through this
//! trait. It is object-safe so callers can hold `&dyn VcsDriver` and swap in
//! [`crate::FakeVcsDriver`] for tests.

use std::path::Path;

use crate::error::VcsError;
use crate::types::{CloneFilter, Identity, MergeOutcome};

/// The VCS abstraction used by the record/replay engines.
///
/// Implementations may shell out to the `git` binary (the default,
/// [`crate::ProcessVcsDriver`]) or be a test double
/// ([`crate::FakeVcsDriver`]).
///
/// # Object safety
///
/// No generic methods, no `Self` in return position outside `Result`.
pub trait VcsDriver {
    /// Clone `url` into `dest`, applying `filter`.
    ///
    /// Replaces: `git clone [--filter=...] [--depth=1] <url> <dest>`.
    fn clone(&self, url: &str, dest: &Path, filter: CloneFilter) -> Result<(), VcsError>;

    /// Set a repository-local config value.
    ///
    /// Must be called once per new clone to set `merge.conflictStyle=diff3`
    /// and `core.abbrev=40` (spec §4.6 step 3) before any merge runs.
    ///
    /// Replaces: `git config <key> <value>`.
    fn set_option(&self, repo: &Path, key: &str, value: &str) -> Result<(), VcsError>;

    /// Fetch a specific commit SHA, optionally shallow to `depth`.
    ///
    /// Replaces: `git fetch [--depth=N] <remote-url> <sha>`.
    fn fetch_sha(&self, repo: &Path, sha: &str, depth: Option<u32>) -> Result<(), VcsError>;

    /// Fetch `pull/<n>/head` into local ref `pr-<n>`.
    ///
    /// Replaces: `git fetch origin pull/<n>/head:pr-<n>`.
    fn fetch_pr(&self, repo: &Path, n: u64) -> Result<(), VcsError>;

    /// Fetch a named branch into a local branch of the same name, so it can
    /// be resolved by a later `rev_parse(repo, branch)`.
    ///
    /// Replaces: `git fetch origin <branch>:<branch>`.
    fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsError>;

    /// Resolve a revision specification to a full 40-char SHA.
    ///
    /// Replaces: `git rev-parse <revspec>`.
    fn rev_parse(&self, repo: &Path, revspec: &str) -> Result<String, VcsError>;

    /// Return the name of the branch currently checked out.
    ///
    /// Replaces: `git rev-parse --abbrev-ref HEAD`.
    fn current_branch(&self, repo: &Path) -> Result<String, VcsError>;

    /// Check out a revision (detaches HEAD unless `revspec` is a branch name).
    ///
    /// Replaces: `git checkout <revspec>`.
    fn checkout(&self, repo: &Path, revspec: &str) -> Result<(), VcsError>;

    /// Create a new branch at the current HEAD and switch to it.
    ///
    /// Replaces: `git checkout -b <name>`.
    fn create_branch(&self, repo: &Path, name: &str) -> Result<(), VcsError>;

    /// Merge `sha` into the current branch with `--no-ff`, under `identity`.
    ///
    /// Replaces: `git merge --no-ff -m <message> <sha>`.
    fn merge_no_ff(
        &self,
        repo: &Path,
        sha: &str,
        message: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError>;

    /// List paths with unresolved conflicts, in git's reported order.
    ///
    /// Replaces: `git diff --name-only --diff-filter=U`.
    fn list_unmerged(&self, repo: &Path) -> Result<Vec<String>, VcsError>;

    /// Stage all working-tree changes.
    ///
    /// Replaces: `git add -A`.
    fn stage_all(&self, repo: &Path) -> Result<(), VcsError>;

    /// Overwrite `.git/MERGE_MSG` with `message`.
    fn write_merge_msg(&self, repo: &Path, message: &str) -> Result<(), VcsError>;

    /// Complete an in-progress merge using the staged `MERGE_MSG`, under
    /// `identity`, without invoking an editor.
    ///
    /// Replaces: `git -c core.editor=true merge --continue`.
    fn merge_continue_noedit(&self, repo: &Path, identity: Identity) -> Result<(), VcsError>;

    /// Commit the current index with `message`, under `identity`.
    ///
    /// Replaces: `git commit -m <message>`.
    fn commit(&self, repo: &Path, message: &str, identity: Identity) -> Result<(), VcsError>;

    /// Apply a unified diff file to the working tree and index.
    ///
    /// Replaces: `git apply --index <path>`.
    fn apply_patch(&self, repo: &Path, patch_path: &Path) -> Result<(), VcsError>;

    /// `true` if there is no diff between `a` and `b` (or the working tree
    /// and `a` if `b` is `None`).
    ///
    /// Replaces: `git diff [--cached] --quiet <a> [<b>]`.
    fn diff_quiet(
        &self,
        repo: &Path,
        a: &str,
        b: Option<&str>,
        cached: bool,
    ) -> Result<bool, VcsError>;

    /// List untracked files, honoring `.gitignore`.
    ///
    /// Replaces: `git ls-files --others --exclude-standard`.
    fn list_untracked(&self, repo: &Path) -> Result<Vec<String>, VcsError>;

    /// List stash entries, most recent first.
    ///
    /// Replaces: `git stash list`.
    fn stash_list(&self, repo: &Path) -> Result<Vec<String>, VcsError>;

    /// One-line log messages for the range `a..b`, oldest first.
    ///
    /// Replaces: `git log --reverse --oneline a..b`.
    fn log_oneline_range(&self, repo: &Path, a: &str, b: &str) -> Result<Vec<String>, VcsError>;

    /// Cherry-pick every commit in `a..b` onto the current branch, under
    /// `identity`.
    ///
    /// Replaces: `git cherry-pick a..b`.
    fn cherry_pick_range(
        &self,
        repo: &Path,
        a: &str,
        b: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError>;

    /// Add a remote.
    ///
    /// Replaces: `git remote add <name> <url>`.
    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), VcsError>;

    /// Produce the unified diff of the index against `base`, with untracked
    /// files already staged by the caller.
    ///
    /// Replaces: `git diff --cached <base>`.
    fn diff_cached_patch(&self, repo: &Path, base: &str) -> Result<Vec<u8>, VcsError>;

    /// Hard-reset the working tree, index, and branch pointer to `revspec`.
    ///
    /// Replaces: `git reset --hard <revspec>`.
    fn reset_hard(&self, repo: &Path, revspec: &str) -> Result<(), VcsError>;

    /// List local branch names starting with `prefix`, lexicographically
    /// sorted.
    ///
    /// Replaces: `git branch --list '<prefix>*' --format=%(refname:short)`.
    fn list_branches(&self, repo: &Path, prefix: &str) -> Result<Vec<String>, VcsError>;

    /// Read a repo-relative file's current bytes, conflict markers included
    /// when the path is mid-merge.
    ///
    /// The resolver and the replay engine's positional re-apply both go
    /// through this rather than `std::fs` directly, so the same code runs
    /// unmodified against [`crate::FakeVcsDriver`], which has no on-disk
    /// presence.
    ///
    /// Replaces: reading `<repo>/<path>` off disk.
    fn read_file(&self, repo: &Path, path: &str) -> Result<Vec<u8>, VcsError>;

    /// Overwrite a repo-relative file's bytes in the working tree.
    ///
    /// Replaces: writing `<repo>/<path>` to disk.
    fn write_file(&self, repo: &Path, path: &str, bytes: &[u8]) -> Result<(), VcsError>;
}
