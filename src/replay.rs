//! Replay engine (spec.md §4.7, C7): reproduces a clone from pins alone,
//! never contacting the advisor. Applies each merge step's recorded
//! resolution purely positionally, then asserts the result's HEAD equals
//! the pinned HEAD byte for byte.

use std::path::Path;

use forkctl_vcs::{CloneFilter, Identity, MergeOutcome, VcsDriver};

use crate::codec;
use crate::config::Entry;
use crate::error::EngineError;
use crate::hook::PostMergeHook;
use crate::local_patch;
use crate::pins::PinStore;

/// What `replay` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The final clone already existed; replay is an idempotent no-op.
    AlreadyPresent,
    /// No manifest and an empty `refs` list: a reference-only entry,
    /// shallow-cloned without recording.
    ShallowCloned,
    /// No manifest but `refs` is non-empty — an invalid state for replay.
    /// Carries a diagnostic message rather than failing the whole command.
    Skipped {
        /// Why replay was skipped.
        reason: String,
    },
    /// A full manifest-driven replay completed and matched the pinned HEAD.
    Replayed {
        /// The HEAD SHA replay produced (equal to the pinned HEAD).
        head: String,
    },
}

struct MergeStep {
    sha: String,
    r#ref: String,
}

fn parse_manifest(text: &str) -> Result<(String, String, Vec<MergeStep>), EngineError> {
    let mut lines = text.lines().filter(|l| !l.is_empty());
    let base_line = lines.next().ok_or_else(|| EngineError::InvalidState {
        name: String::new(),
        detail: "manifest has no base line".to_owned(),
    })?;
    let (base_sha, default_branch) = base_line.split_once('\t').ok_or_else(|| EngineError::InvalidState {
        name: String::new(),
        detail: format!("malformed manifest base line: {base_line}"),
    })?;
    let mut steps = Vec::new();
    for line in lines {
        let (sha, r#ref) = line.split_once('\t').ok_or_else(|| EngineError::InvalidState {
            name: String::new(),
            detail: format!("malformed manifest merge line: {line}"),
        })?;
        steps.push(MergeStep { sha: sha.to_owned(), r#ref: r#ref.to_owned() });
    }
    Ok((base_sha.to_owned(), default_branch.to_owned(), steps))
}

/// Run the replay engine for `entry`, named `name`, against its clone at
/// `clone_dir` and its pins rooted at `pins`. Pins are read-only throughout
/// — replay never writes `HEAD`, `manifest`, resolutions, or local patches.
pub fn replay(
    name: &str,
    entry: &Entry,
    pins: &PinStore,
    clone_dir: &Path,
    vcs: &dyn VcsDriver,
    hook: &dyn PostMergeHook,
) -> Result<ReplayOutcome, EngineError> {
    if clone_dir.exists() {
        return Ok(ReplayOutcome::AlreadyPresent);
    }

    let manifest_text = pins.read_manifest()?;

    let clone_parent = clone_dir.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(clone_parent)?;

    let Some(manifest_text) = manifest_text else {
        if !entry.is_reference_only() {
            return Ok(ReplayOutcome::Skipped {
                reason: format!(
                    "`{name}` has no manifest but {} configured ref(s): this state is invalid for replay — run `record {name}`",
                    entry.refs.len()
                ),
            });
        }
        let staging = tempfile::Builder::new().prefix(&format!(".work-{name}.")).tempdir_in(clone_parent)?;
        vcs.clone(&entry.upstream, staging.path(), CloneFilter::Shallow)?;
        let staged_path = staging.keep();
        std::fs::rename(&staged_path, clone_dir)?;
        return Ok(ReplayOutcome::ShallowCloned);
    };

    let (base_sha, _default_branch, steps) = parse_manifest(&manifest_text).map_err(|e| match e {
        EngineError::InvalidState { detail, .. } => EngineError::InvalidState { name: name.to_owned(), detail },
        other => other,
    })?;

    let staging = tempfile::Builder::new().prefix(&format!(".work-{name}.")).tempdir_in(clone_parent)?;
    let result = replay_body(name, entry, pins, staging.path(), &base_sha, &steps, vcs, hook);

    match result {
        Ok(head) => {
            let staged_path = staging.keep();
            std::fs::rename(&staged_path, clone_dir)?;
            Ok(ReplayOutcome::Replayed { head })
        }
        Err(e) => Err(EngineError::Failed {
            detail: format!("{e} — previous clone at {} is untouched", clone_dir.display()),
        }),
    }
}

fn replay_body(
    name: &str,
    entry: &Entry,
    pins: &PinStore,
    repo: &Path,
    base_sha: &str,
    steps: &[MergeStep],
    vcs: &dyn VcsDriver,
    hook: &dyn PostMergeHook,
) -> Result<String, EngineError> {
    vcs.clone(&entry.upstream, repo, CloneFilter::BlobNone)?;
    vcs.set_option(repo, "merge.conflictStyle", "diff3")?;
    vcs.set_option(repo, "core.abbrev", "40")?;
    vcs.fetch_sha(repo, base_sha, None)?;
    vcs.checkout(repo, base_sha)?;
    vcs.create_branch(repo, "wip")?;

    for (idx, step) in steps.iter().enumerate() {
        let i = idx + 1;
        let identity = Identity::ci(i as u64);
        vcs.fetch_sha(repo, &step.sha, None)?;
        let message = format!("Merge {} into wip", step.r#ref);
        match vcs.merge_no_ff(repo, &step.sha, &message, identity)? {
            MergeOutcome::Ok => {}
            MergeOutcome::Conflicted { paths } => {
                let resolution_bytes = pins.read_resolution(i)?.ok_or_else(|| EngineError::StateMissing {
                    name: name.to_owned(),
                    what: format!("res-{i}.resolution"),
                })?;
                let blocks = codec::decode(&resolution_bytes)?;
                for path in &paths {
                    let block = blocks.iter().find(|b| &b.path == path).ok_or_else(|| EngineError::StateMissing {
                        name: name.to_owned(),
                        what: format!("res-{i}.resolution block for {path}"),
                    })?;
                    let conflicted = vcs.read_file(repo, path)?;
                    let resolved = codec::apply_positional(&conflicted, &block.conflicts)?;
                    vcs.write_file(repo, path, &resolved)?;
                }
                vcs.stage_all(repo)?;
                vcs.write_merge_msg(repo, &message)?;
                vcs.merge_continue_noedit(repo, identity)?;
            }
        }
    }

    let merge_count = steps.len();
    let hook_changed = hook.run(repo, merge_count)?;
    if hook_changed {
        vcs.stage_all(repo)?;
        if !vcs.diff_quiet(repo, "HEAD", None, true)? {
            vcs.commit(repo, "patch: source-level type resolution", Identity::ci(merge_count as u64 + 1))?;
        }
    }

    for (i, filename) in pins.list_local_patches()?.iter().enumerate() {
        let i = i + 1;
        let patch_path = pins.local_patch_path(filename);
        vcs.apply_patch(repo, &patch_path).map_err(|e| EngineError::LocalPatch {
            filename: filename.clone(),
            detail: e.to_string(),
        })?;
        let identity = Identity::ci(local_patch::patch_identity_secs(merge_count, i) as u64);
        vcs.commit(repo, &local_patch::commit_message(filename), identity)?;
    }

    let actual_head = vcs.rev_parse(repo, "HEAD")?;
    let pinned_head = pins.read_head()?;
    if actual_head != pinned_head {
        return Err(EngineError::HeadMismatch { name: name.to_owned(), pinned: pinned_head, actual: actual_head });
    }

    if let Some(fork_url) = &entry.fork {
        vcs.add_remote(repo, "fork", fork_url)?;
    }

    tracing::info!(name, head = %actual_head, merges = steps.len(), "replay complete");
    Ok(actual_head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_manifest_base_and_steps() {
        let text = "base_sha\tmain\nsha1\tfeature\nsha2\t123\n";
        let (base, branch, steps) = parse_manifest(text).unwrap();
        assert_eq!(base, "base_sha");
        assert_eq!(branch, "main");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].sha, "sha1");
        assert_eq!(steps[0].r#ref, "feature");
    }

    #[test]
    fn parse_manifest_rejects_empty() {
        assert!(parse_manifest("").is_err());
    }
}
