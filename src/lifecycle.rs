//! Lifecycle commands (spec.md §4.9, C9): `save`, `push`, `clean`, `reset`,
//! and their `-all` variants that iterate every configured entry.

use std::path::Path;

use forkctl_vcs::{Identity, MergeOutcome, VcsDriver};

use crate::config::{Config, Entry};
use crate::error::EngineError;
use crate::hook;
use crate::local_patch;
use crate::pins::PinStore;
use crate::replay::{self, ReplayOutcome};
use crate::status::{self, Status};

/// What `save` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The worktree matched the pinned HEAD exactly; nothing to save.
    NoChanges,
    /// A new local patch was written and committed.
    Saved {
        /// The new patch's filename.
        filename: String,
        /// The HEAD SHA after re-applying every local patch.
        head: String,
    },
}

/// Capture the worktree's divergence from the pinned HEAD as a new local
/// patch, then rebuild the clone from that HEAD by reapplying every local
/// patch (including the new one) under deterministic identities, so a future
/// replay reproduces the same commits from the patch files alone.
pub fn save(name: &str, desc: &str, entry: &Entry, pins: &PinStore, clone_dir: &Path, vcs: &dyn VcsDriver) -> Result<SaveOutcome, EngineError> {
    let current_branch = vcs.current_branch(clone_dir)?;
    if current_branch != "wip" {
        return Err(EngineError::InvalidState {
            name: name.to_owned(),
            detail: format!("current branch is `{current_branch}`, not `wip` — check out `wip` before saving"),
        });
    }

    let pinned_head = pins.read_head()?;

    let worktree_clean = vcs.diff_quiet(clone_dir, &pinned_head, None, false)?;
    let index_clean = vcs.diff_quiet(clone_dir, &pinned_head, None, true)?;
    if worktree_clean && index_clean {
        return Ok(SaveOutcome::NoChanges);
    }

    let existing = pins.list_local_patches()?;
    let number = u32::try_from(existing.len() + 1).unwrap_or(u32::MAX);
    let filename = local_patch::patch_filename(number, desc);

    vcs.stage_all(clone_dir)?;
    let diff = vcs.diff_cached_patch(clone_dir, &pinned_head)?;
    pins.write_local_patch(&filename, &diff)?;

    let merge_count = pins.merge_count()?;
    let rebuild_result = rebuild_from_patches(name, clone_dir, &pinned_head, existing.len(), merge_count, pins, vcs);

    match rebuild_result {
        Ok(head) => {
            pins.write_head(&head)?;
            tracing::info!(name, filename = %filename, head = %head, "save complete");
            Ok(SaveOutcome::Saved { filename, head })
        }
        Err(e) => {
            pins.remove_local_patch(&filename)?;
            Err(e)
        }
    }
}

/// Reset to the commit `existing_count` patches back from `pinned_head`, then
/// reapply every patch currently on disk (in lexicographic order) as fresh
/// commits under the same deterministic identities `record`/`replay` use.
fn rebuild_from_patches(
    name: &str,
    repo: &Path,
    pinned_head: &str,
    existing_count: usize,
    merge_count: usize,
    pins: &PinStore,
    vcs: &dyn VcsDriver,
) -> Result<String, EngineError> {
    let pre_patches_rev = if existing_count == 0 { pinned_head.to_owned() } else { format!("{pinned_head}~{existing_count}") };
    vcs.reset_hard(repo, &pre_patches_rev)?;

    for (idx, filename) in pins.list_local_patches()?.iter().enumerate() {
        let i = idx + 1;
        let patch_path = pins.local_patch_path(filename);
        vcs.apply_patch(repo, &patch_path).map_err(|e| EngineError::LocalPatch {
            filename: filename.clone(),
            detail: e.to_string(),
        })?;
        let identity = Identity::ci(local_patch::patch_identity_secs(merge_count, i) as u64);
        vcs.commit(repo, &local_patch::commit_message(filename), identity)?;
    }

    let head = vcs.rev_parse(repo, "HEAD")?;
    tracing::debug!(name, head = %head, "rebuilt from local patches");
    Ok(head)
}

/// What `push` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Every commit since the pinned HEAD cherry-picked cleanly onto the
    /// target branch.
    Pushed {
        /// The branch the commits were cherry-picked onto.
        target: String,
    },
    /// The cherry-pick conflicted; the target branch is left mid-cherry-pick
    /// for the operator to resolve by hand. No automatic rollback.
    Conflicted {
        /// The branch the commits were cherry-picked onto.
        target: String,
        /// Paths with unresolved conflicts.
        paths: Vec<String>,
    },
}

/// Cherry-pick every commit from `pinned_head..wip` onto `target` (or, if
/// `target` is `None`, the lexicographically-last `pr-*` branch). Requires a
/// `wip` branch to exist — the branch the record/replay engines always build
/// their merge schedule on.
pub fn push(entry_name: &str, target: Option<&str>, pins: &PinStore, clone_dir: &Path, vcs: &dyn VcsDriver) -> Result<PushOutcome, EngineError> {
    let branches = vcs.list_branches(clone_dir, "")?;
    if !branches.iter().any(|b| b == "wip") {
        return Err(EngineError::InvalidState {
            name: entry_name.to_owned(),
            detail: "no `wip` branch in this clone — run `record` or `replay` first".to_owned(),
        });
    }

    let target = match target {
        Some(t) => t.to_owned(),
        None => {
            let mut pr_branches = vcs.list_branches(clone_dir, "pr-")?;
            pr_branches.sort();
            pr_branches.pop().ok_or_else(|| EngineError::InvalidState {
                name: entry_name.to_owned(),
                detail: "no `pr-*` branch to push to and no target given".to_owned(),
            })?
        }
    };

    let pinned_head = pins.read_head()?;
    vcs.checkout(clone_dir, &target)?;

    let now_secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let identity = Identity::ci(now_secs);

    match vcs.cherry_pick_range(clone_dir, &pinned_head, "wip", identity)? {
        MergeOutcome::Ok => {
            tracing::info!(name = entry_name, target = %target, "push complete");
            Ok(PushOutcome::Pushed { target })
        }
        MergeOutcome::Conflicted { paths } => {
            tracing::warn!(name = entry_name, target = %target, paths = ?paths, "push conflicted, left for manual resolution");
            Ok(PushOutcome::Conflicted { target, paths })
        }
    }
}

/// Remove the live clone (but not its pins) if the status guard reports it
/// safe to wipe.
pub fn clean(entry: &Entry, pins: &PinStore, clone_dir: &Path, vcs: &dyn VcsDriver) -> Result<(), EngineError> {
    if let Status::Dirty(reasons) = status::status(entry, pins, clone_dir, vcs)? {
        return Err(EngineError::GuardFailed { reasons: status::explain(&reasons) });
    }
    if clone_dir.exists() {
        std::fs::remove_dir_all(clone_dir)?;
    }
    Ok(())
}

/// Remove both the live clone and its pins if the status guard reports the
/// clone safe to wipe. Unlike [`clean`], this erases recorded history —
/// the next `record` starts from nothing.
pub fn reset(entry: &Entry, pins: &PinStore, clone_dir: &Path, vcs: &dyn VcsDriver) -> Result<(), EngineError> {
    if let Status::Dirty(reasons) = status::status(entry, pins, clone_dir, vcs)? {
        return Err(EngineError::GuardFailed { reasons: status::explain(&reasons) });
    }
    if clone_dir.exists() {
        std::fs::remove_dir_all(clone_dir)?;
    }
    let pins_dir = pins.dir();
    if pins_dir.exists() {
        std::fs::remove_dir_all(&pins_dir)?;
    }
    Ok(())
}

/// One entry's result from an `-all` command.
pub struct NamedResult<T> {
    /// The entry name.
    pub name: String,
    /// The per-entry outcome or error.
    pub result: Result<T, EngineError>,
}

/// Run [`status::status`] against every configured entry.
pub fn status_all(
    config: &Config,
    pins_root: &Path,
    clones_root: &Path,
    vcs: &dyn VcsDriver,
) -> Vec<NamedResult<Status>> {
    config
        .all_names()
        .into_iter()
        .map(|name| {
            let result = config.get(name).map_err(EngineError::from).and_then(|entry| {
                let pins = PinStore::new(pins_root, name);
                let clone_dir = clones_root.join(name);
                status::status(entry, &pins, &clone_dir, vcs)
            });
            NamedResult { name: name.to_owned(), result }
        })
        .collect()
}

/// Run [`clean`] against every configured entry.
pub fn clean_all(config: &Config, pins_root: &Path, clones_root: &Path, vcs: &dyn VcsDriver) -> Vec<NamedResult<()>> {
    config
        .all_names()
        .into_iter()
        .map(|name| {
            let result = config.get(name).map_err(EngineError::from).and_then(|entry| {
                let pins = PinStore::new(pins_root, name);
                let clone_dir = clones_root.join(name);
                clean(entry, &pins, &clone_dir, vcs)
            });
            NamedResult { name: name.to_owned(), result }
        })
        .collect()
}

/// Run [`crate::replay::replay`] against every configured entry, each under
/// the post-merge hook its own configuration names.
pub fn replay_all(
    config: &Config,
    pins_root: &Path,
    clones_root: &Path,
    vcs: &dyn VcsDriver,
) -> Vec<NamedResult<ReplayOutcome>> {
    config
        .all_names()
        .into_iter()
        .map(|name| {
            let result = config.get(name).map_err(EngineError::from).and_then(|entry| {
                let pins = PinStore::new(pins_root, name);
                let clone_dir = clones_root.join(name);
                let hook = hook::from_entry(entry);
                replay::replay(name, entry, &pins, &clone_dir, vcs, hook.as_ref())
            });
            NamedResult { name: name.to_owned(), result }
        })
        .collect()
}
