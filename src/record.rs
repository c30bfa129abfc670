//! Record engine (spec.md §4.6, C6): builds a fresh clone + pin set for an
//! entry from its config and any pins already on disk, staging everything
//! in a sibling directory before an atomic two-`rename` swap into place.
//!
//! Never runs unless [`crate::status::status`] reports the live clone safe
//! to wipe. Local patches from a prior record always carry forward; merge
//! resolutions from a prior record are offered to the resolver as reuse
//! candidates but are always regenerated.

use std::path::{Path, PathBuf};

use forkctl_vcs::{CloneFilter, Identity, MergeOutcome, VcsDriver};

use crate::advisor::Advisor;
use crate::codec::{self, FileBlock};
use crate::config::Entry;
use crate::error::EngineError;
use crate::hook::PostMergeHook;
use crate::local_patch;
use crate::pins::PinStore;
use crate::refspec::{self, RefKind};
use crate::resolver;
use crate::status::{self, Status};

/// What `record` produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The final HEAD SHA written to the `HEAD` pin.
    pub head: String,
}

/// What the record engine read out of the pre-existing pins before
/// overwriting them, so local patches carry forward and prior resolutions
/// can seed the resolver's reuse tier.
struct Preserved {
    local_patches: Vec<(String, Vec<u8>)>,
    resolutions: Vec<Option<Vec<u8>>>,
}

fn preserve(pins: &PinStore, merge_count_hint: usize) -> Result<Preserved, EngineError> {
    let mut local_patches = Vec::new();
    for filename in pins.list_local_patches()? {
        let bytes = pins.read_local_patch(&filename)?;
        local_patches.push((filename, bytes));
    }
    let mut resolutions = Vec::with_capacity(merge_count_hint);
    for k in 1..=merge_count_hint {
        resolutions.push(pins.read_resolution(k)?);
    }
    Ok(Preserved { local_patches, resolutions })
}

impl Preserved {
    fn resolution_for(&self, k: usize) -> Option<&[u8]> {
        self.resolutions.get(k - 1).and_then(Option::as_deref)
    }
}

/// Resolve `r` to a full SHA by dispatching on [`refspec::classify`], fetching
/// whichever ref kind it names.
fn fetch_and_resolve(repo: &Path, r: &str, vcs: &dyn VcsDriver) -> Result<String, EngineError> {
    match refspec::classify(r) {
        RefKind::Hash(h) => {
            vcs.fetch_sha(repo, &h, None)?;
            Ok(vcs.rev_parse(repo, &h)?)
        }
        RefKind::Pr(n) => {
            vcs.fetch_pr(repo, n)?;
            Ok(vcs.rev_parse(repo, &format!("pr-{n}"))?)
        }
        RefKind::Branch(b) => {
            vcs.fetch_branch(repo, &b)?;
            Ok(vcs.rev_parse(repo, &b)?)
        }
    }
}

/// Resolve every conflicted path of one merge step in parallel, sequential
/// within each file. Any single resolver failure fails the whole step; the
/// scope still joins every in-flight resolver before returning.
fn resolve_merge_step(
    repo: &Path,
    paths: &[String],
    prior: &[FileBlock],
    vcs: &(dyn VcsDriver + Sync),
    advisor: &dyn Advisor,
) -> Result<Vec<FileBlock>, EngineError> {
    let results: Vec<Result<FileBlock, EngineError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let prior_block = prior.iter().find(|b| &b.path == path);
                scope.spawn(move || -> Result<FileBlock, EngineError> {
                    let conflicted = vcs.read_file(repo, path)?;
                    let (resolved, block) = resolver::resolve_file(path, &conflicted, prior_block, advisor)?;
                    vcs.write_file(repo, path, &resolved)?;
                    Ok(block)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(EngineError::Failed { detail: "resolver thread panicked".to_owned() })
                })
            })
            .collect()
    });
    results.into_iter().collect()
}

/// Drops the wrapped [`PinStore`]'s staging override when it goes out of
/// scope, regardless of which branch of the caller returns.
struct OverrideGuard<'a> {
    pins: &'a mut PinStore,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.pins.clear_override();
    }
}

/// Run the record engine for `entry`, named `name`, against its clone at
/// `clone_dir` and its pins rooted at `pins`. `ref_overrides`, if non-empty,
/// replaces `entry.refs` for this run (spec.md §6's `record <name> [ref...]`).
#[allow(clippy::too_many_arguments)]
pub fn record(
    name: &str,
    ref_overrides: &[String],
    entry: &Entry,
    pins: &mut PinStore,
    clone_dir: &Path,
    vcs: &(dyn VcsDriver + Sync),
    advisor: &dyn Advisor,
    hook: &dyn PostMergeHook,
) -> Result<RecordOutcome, EngineError> {
    if let Status::Dirty(reasons) = status::status(entry, pins, clone_dir, vcs)? {
        return Err(EngineError::GuardFailed { reasons: status::explain(&reasons) });
    }

    let refs: &[String] = if ref_overrides.is_empty() { &entry.refs } else { ref_overrides };

    let prior_merge_count = pins.merge_count()?;
    let preserved = preserve(pins, prior_merge_count)?;

    let clone_parent = clone_dir.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(clone_parent)?;
    let staging_clone = tempfile::Builder::new().prefix(&format!(".work-{name}.")).tempdir_in(clone_parent)?;

    let pins_root = pins.real_root().to_path_buf();
    std::fs::create_dir_all(&pins_root)?;
    let staging_pins = tempfile::Builder::new().prefix(&format!(".work-{name}-pins.")).tempdir_in(&pins_root)?;

    pins.set_override(staging_pins.path());
    let guard = OverrideGuard { pins };

    let body_result = record_body(name, refs, entry, guard.pins, staging_clone.path(), vcs, advisor, hook, &preserved);
    drop(guard);

    match body_result {
        Ok(head) => {
            let staged_clone_path = staging_clone.keep();
            let staged_pins_root = staging_pins.keep();
            let staged_pins_dir = staged_pins_root.join(name);

            if clone_dir.exists() {
                std::fs::remove_dir_all(clone_dir)?;
            }
            std::fs::rename(&staged_clone_path, clone_dir)?;

            let final_pins_dir = pins.dir();
            if final_pins_dir.exists() {
                std::fs::remove_dir_all(&final_pins_dir)?;
            }
            std::fs::rename(&staged_pins_dir, &final_pins_dir)?;
            let _ = std::fs::remove_dir(&staged_pins_root);

            Ok(RecordOutcome { head })
        }
        Err(e) => Err(EngineError::Failed {
            detail: format!(
                "{e} — previous clone at {} and pins at {} are untouched",
                clone_dir.display(),
                pins.dir().display()
            ),
        }),
    }
}

/// The staged portion of record: everything between "staging exists" and
/// "we know the final HEAD", run entirely against staging paths. Errors
/// here never touch the real clone or pin directories.
#[allow(clippy::too_many_arguments)]
fn record_body(
    name: &str,
    refs: &[String],
    entry: &Entry,
    pins: &PinStore,
    repo: &Path,
    vcs: &(dyn VcsDriver + Sync),
    advisor: &dyn Advisor,
    hook: &dyn PostMergeHook,
    preserved: &Preserved,
) -> Result<String, EngineError> {
    vcs.clone(&entry.upstream, repo, CloneFilter::BlobNone)?;
    vcs.set_option(repo, "merge.conflictStyle", "diff3")?;
    vcs.set_option(repo, "core.abbrev", "40")?;

    let default_branch = vcs.current_branch(repo)?;
    let base_sha = vcs.rev_parse(repo, "HEAD")?;
    vcs.create_branch(repo, "wip")?;

    let mut manifest = format!("{base_sha}\t{default_branch}\n");
    pins.write_manifest(&manifest)?;

    for (idx, r) in refs.iter().enumerate() {
        let i = idx + 1;
        let identity = Identity::ci(i as u64);
        let sha = fetch_and_resolve(repo, r, vcs)?;
        manifest.push_str(&format!("{sha}\t{r}\n"));
        pins.write_manifest(&manifest)?;

        let message = format!("Merge {r} into wip");
        match vcs.merge_no_ff(repo, &sha, &message, identity)? {
            MergeOutcome::Ok => {}
            MergeOutcome::Conflicted { paths } => {
                let prior_blocks = preserved
                    .resolution_for(i)
                    .map(codec::decode)
                    .transpose()
                    .map_err(|e| EngineError::Failed { detail: format!("reusing res-{i}.resolution: {e}") })?
                    .unwrap_or_default();
                let blocks = resolve_merge_step(repo, &paths, &prior_blocks, vcs, advisor)?;
                vcs.stage_all(repo)?;
                pins.write_resolution(i, &codec::encode(&blocks))?;
                vcs.write_merge_msg(repo, &message)?;
                vcs.merge_continue_noedit(repo, identity)?;
            }
        }
    }

    let merge_count = refs.len();
    let hook_changed = hook.run(repo, merge_count)?;
    if hook_changed {
        vcs.stage_all(repo)?;
        if !vcs.diff_quiet(repo, "HEAD", None, true)? {
            vcs.commit(repo, "patch: source-level type resolution", Identity::ci(merge_count as u64 + 1))?;
        }
    }

    for (i, (filename, bytes)) in preserved.local_patches.iter().enumerate() {
        let i = i + 1;
        pins.write_local_patch(filename, bytes)?;
        let patch_path = pins.local_patch_path(filename);
        vcs.apply_patch(repo, &patch_path).map_err(|e| EngineError::LocalPatch {
            filename: filename.clone(),
            detail: e.to_string(),
        })?;
        let identity = Identity::ci(local_patch::patch_identity_secs(merge_count, i) as u64);
        vcs.commit(repo, &local_patch::commit_message(filename), identity)?;
    }

    let head = vcs.rev_parse(repo, "HEAD")?;
    pins.write_head(&head)?;

    if let Some(fork_url) = &entry.fork {
        vcs.add_remote(repo, "fork", fork_url)?;
    }

    tracing::info!(name, head = %head, merges = refs.len(), "record complete");
    Ok(head)
}
