//! An in-memory [`VcsDriver`] test double.
//!
//! Exercises the record/replay engines without a real git binary or
//! filesystem layout. Repositories are identified by path; commits are
//! content-addressed by a monotonic counter rendered as 40 hex digits (valid
//! per the engine's "full 40-char hash" invariant, though not real SHA-1).
//!
//! Merges are resolved per-path by whole-file three-way comparison (not a
//! line-level diff): a path that differs between "ours" and "theirs", and
//! differs from the seeded base on both sides, becomes a conflict whose
//! working-tree content is a single diff3-marker block wrapping the three
//! whole-file variants. This is coarser than real git but is sufficient to
//! drive the resolution codec and resolver pipeline end to end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::driver::VcsDriver;
use crate::error::VcsError;
use crate::types::{CloneFilter, Identity, MergeOutcome};

type Tree = BTreeMap<String, Vec<u8>>;

#[derive(Clone, Default)]
struct FakeRepo {
    files: Tree,
    branches: BTreeMap<String, String>,
    current_branch: Option<String>,
    head: String,
    config: BTreeMap<String, String>,
    remotes: BTreeMap<String, String>,
    commit_log: Vec<String>,
    conflicted: Vec<String>,
    merge_msg: Option<String>,
    untracked: Vec<String>,
    stashes: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    repos: BTreeMap<PathBuf, FakeRepo>,
    /// `sha -> (tree, base_tree)` registered by the test before `fetch_sha`.
    seeded_commits: BTreeMap<String, (Tree, Tree)>,
    /// `origin URL -> initial tree` registered before `clone`.
    seeded_remotes: BTreeMap<String, Tree>,
    /// branch name -> tree, for `fetch_branch`/`fetch_pr`.
    seeded_branches: BTreeMap<String, Tree>,
    /// patch path (as given to `apply_patch`) -> resulting file overlay.
    seeded_patches: BTreeMap<String, Tree>,
    next_commit: u64,
}

/// An in-memory git double. See module docs.
#[derive(Default)]
pub struct FakeVcsDriver {
    state: Mutex<FakeState>,
}

impl FakeVcsDriver {
    /// Create an empty fake driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tree a future `clone(url, ...)` call should materialize.
    pub fn seed_remote(&self, url: &str, tree: Tree) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).seeded_remotes.insert(url.to_owned(), tree);
    }

    /// Register a commit's full tree (and the base tree to three-way-merge
    /// against) for a future `fetch_sha` + `merge_no_ff`.
    pub fn seed_commit(&self, sha: &str, tree: Tree, base_tree: Tree) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).seeded_commits.insert(sha.to_owned(), (tree, base_tree));
    }

    /// Register the tree a `fetch_branch`/`fetch_pr` should resolve to.
    pub fn seed_branch(&self, name: &str, tree: Tree) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).seeded_branches.insert(name.to_owned(), tree);
    }

    /// Register what applying the patch at `patch_path` should do to the tree.
    pub fn seed_patch(&self, patch_path: &str, overlay: Tree) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).seeded_patches.insert(patch_path.to_owned(), overlay);
    }

    /// Read back a repo's current materialized file content, for assertions.
    #[must_use]
    pub fn file(&self, repo: &Path, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .cloned()
    }

    fn next_sha(state: &mut FakeState) -> String {
        let n = state.next_commit;
        state.next_commit += 1;
        format!("{n:040x}")
    }
}

const fn identity_unused(_: Identity) {}

impl VcsDriver for FakeVcsDriver {
    fn clone(&self, url: &str, dest: &Path, _filter: CloneFilter) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tree = state.seeded_remotes.get(url).cloned().unwrap_or_default();
        let sha = Self::next_sha(&mut state);
        let mut repo = FakeRepo { files: tree, head: sha.clone(), ..FakeRepo::default() };
        repo.branches.insert("main".to_owned(), sha.clone());
        repo.current_branch = Some("main".to_owned());
        repo.commit_log.push(sha);
        state.repos.insert(dest.to_path_buf(), repo);
        Ok(())
    }

    fn set_option(&self, repo: &Path, key: &str, value: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.config.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn fetch_sha(&self, _repo: &Path, _sha: &str, _depth: Option<u32>) -> Result<(), VcsError> {
        Ok(())
    }

    fn fetch_pr(&self, repo: &Path, n: u64) -> Result<(), VcsError> {
        self.fetch_branch(repo, &format!("pr-{n}"))
    }

    fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(tree) = state.seeded_branches.get(branch).cloned() else {
            return Ok(());
        };
        let sha = Self::next_sha(&mut state);
        state.seeded_commits.insert(sha.clone(), (tree, Tree::new()));
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.branches.insert(branch.to_owned(), sha);
        Ok(())
    }

    fn rev_parse(&self, repo: &Path, revspec: &str) -> Result<String, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if revspec.len() == 40 && revspec.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(revspec.to_owned());
        }
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        if revspec == "HEAD" {
            return Ok(r.head.clone());
        }
        if let Some(sha) = r.branches.get(revspec) {
            return Ok(sha.clone());
        }
        Err(VcsError::NotFound(format!("revspec `{revspec}` in {}", repo.display())))
    }

    fn current_branch(&self, repo: &Path) -> Result<String, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.current_branch.clone().ok_or_else(|| VcsError::NotFound("detached HEAD".to_owned()))
    }

    fn checkout(&self, repo: &Path, revspec: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        if let Some(sha) = r.branches.get(revspec).cloned() {
            r.head = sha;
            r.current_branch = Some(revspec.to_owned());
        } else {
            r.head = revspec.to_owned();
            r.current_branch = None;
        }
        Ok(())
    }

    fn create_branch(&self, repo: &Path, name: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.branches.insert(name.to_owned(), r.head.clone());
        r.current_branch = Some(name.to_owned());
        Ok(())
    }

    fn merge_no_ff(
        &self,
        repo: &Path,
        sha: &str,
        message: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError> {
        identity_unused(identity);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (theirs, base) = state.seeded_commits.get(sha).cloned().unwrap_or_default();
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;

        let mut paths: Vec<&String> = r.files.keys().chain(theirs.keys()).chain(base.keys()).collect();
        paths.sort();
        paths.dedup();

        let mut conflicted = Vec::new();
        let mut merged = Tree::new();
        for path in paths {
            let ours = r.files.get(path);
            let theirs_v = theirs.get(path);
            let base_v = base.get(path);
            match (ours, theirs_v) {
                (Some(o), Some(t)) if o == t => {
                    merged.insert(path.clone(), o.clone());
                }
                (Some(_), Some(t)) if base_v == ours => {
                    merged.insert(path.clone(), t.clone());
                }
                (Some(o), Some(_)) if base_v == theirs_v => {
                    merged.insert(path.clone(), o.clone());
                }
                (Some(o), Some(t)) => {
                    merged.insert(path.clone(), diff3_block(o, base_v, t));
                    conflicted.push(path.clone());
                }
                (Some(o), None) => {
                    merged.insert(path.clone(), o.clone());
                }
                (None, Some(t)) => {
                    merged.insert(path.clone(), t.clone());
                }
                (None, None) => {}
            }
        }

        r.files = merged;
        if conflicted.is_empty() {
            let new_sha = Self::next_sha(&mut state);
            let r = state.repos.get_mut(repo).expect("repo present");
            r.head = new_sha.clone();
            if let Some(b) = r.current_branch.clone() {
                r.branches.insert(b, new_sha.clone());
            }
            r.commit_log.push(new_sha);
            r.merge_msg = Some(message.to_owned());
            Ok(MergeOutcome::Ok)
        } else {
            let r = state.repos.get_mut(repo).expect("repo present");
            r.conflicted = conflicted.clone();
            r.merge_msg = Some(message.to_owned());
            Ok(MergeOutcome::Conflicted { paths: conflicted })
        }
    }

    fn list_unmerged(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(state.repos.get(repo).map(|r| r.conflicted.clone()).unwrap_or_default())
    }

    fn stage_all(&self, _repo: &Path) -> Result<(), VcsError> {
        Ok(())
    }

    fn write_merge_msg(&self, repo: &Path, message: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.merge_msg = Some(message.to_owned());
        Ok(())
    }

    fn merge_continue_noedit(&self, repo: &Path, identity: Identity) -> Result<(), VcsError> {
        identity_unused(identity);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let new_sha = Self::next_sha(&mut state);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.conflicted.clear();
        r.head = new_sha.clone();
        if let Some(b) = r.current_branch.clone() {
            r.branches.insert(b, new_sha.clone());
        }
        r.commit_log.push(new_sha);
        Ok(())
    }

    fn commit(&self, repo: &Path, message: &str, identity: Identity) -> Result<(), VcsError> {
        identity_unused(identity);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let new_sha = Self::next_sha(&mut state);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.head = new_sha.clone();
        if let Some(b) = r.current_branch.clone() {
            r.branches.insert(b, new_sha.clone());
        }
        r.commit_log.push(new_sha);
        r.merge_msg = Some(message.to_owned());
        Ok(())
    }

    fn apply_patch(&self, repo: &Path, patch_path: &Path) -> Result<(), VcsError> {
        let key = patch_path.to_string_lossy().into_owned();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let overlay = state
            .seeded_patches
            .get(&key)
            .cloned()
            .ok_or_else(|| VcsError::NotFound(format!("no seeded patch for {key}")))?;
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        for (path, content) in overlay {
            r.files.insert(path, content);
        }
        Ok(())
    }

    fn diff_quiet(
        &self,
        repo: &Path,
        a: &str,
        _b: Option<&str>,
        _cached: bool,
    ) -> Result<bool, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        Ok(r.head == a && r.conflicted.is_empty())
    }

    fn list_untracked(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(state.repos.get(repo).map(|r| r.untracked.clone()).unwrap_or_default())
    }

    fn stash_list(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(state.repos.get(repo).map(|r| r.stashes.clone()).unwrap_or_default())
    }

    fn log_oneline_range(&self, repo: &Path, a: &str, b: &str) -> Result<Vec<String>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        let start = r.commit_log.iter().position(|c| c == a).map_or(0, |i| i + 1);
        let end = r.commit_log.iter().position(|c| c == b).map_or(r.commit_log.len(), |i| i + 1);
        Ok(r.commit_log.get(start..end).unwrap_or_default().iter().map(|c| format!("{c} commit")).collect())
    }

    fn cherry_pick_range(
        &self,
        repo: &Path,
        _a: &str,
        _b: &str,
        identity: Identity,
    ) -> Result<MergeOutcome, VcsError> {
        identity_unused(identity);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let new_sha = Self::next_sha(&mut state);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.head = new_sha.clone();
        if let Some(b) = r.current_branch.clone() {
            r.branches.insert(b, new_sha.clone());
        }
        r.commit_log.push(new_sha);
        Ok(MergeOutcome::Ok)
    }

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.remotes.insert(name.to_owned(), url.to_owned());
        Ok(())
    }

    fn diff_cached_patch(&self, repo: &Path, _base: &str) -> Result<Vec<u8>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        let mut out = Vec::new();
        for (path, content) in &r.files {
            out.extend_from_slice(format!("diff --git a/{path} b/{path}\n").as_bytes());
            out.extend_from_slice(content);
        }
        Ok(out)
    }

    fn reset_hard(&self, repo: &Path, revspec: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.head = revspec.to_owned();
        r.conflicted.clear();
        Ok(())
    }

    fn list_branches(&self, repo: &Path, prefix: &str) -> Result<Vec<String>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        let mut names: Vec<String> = r.branches.keys().filter(|b| b.starts_with(prefix)).cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read_file(&self, repo: &Path, path: &str) -> Result<Vec<u8>, VcsError> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.files.get(path).cloned().ok_or_else(|| VcsError::NotFound(format!("{path} in {}", repo.display())))
    }

    fn write_file(&self, repo: &Path, path: &str, bytes: &[u8]) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let r = state.repos.get_mut(repo).ok_or_else(|| VcsError::NotFound(repo.display().to_string()))?;
        r.files.insert(path.to_owned(), bytes.to_vec());
        Ok(())
    }
}

/// Build a whole-file diff3-marker conflict block for the fake merge.
fn diff3_block(ours: &[u8], base: Option<&Vec<u8>>, theirs: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(ours);
    if !ours.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(b"||||||| base\n");
    if let Some(b) = base {
        out.extend_from_slice(b);
        if !b.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(theirs);
    if !theirs.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(b">>>>>>> incoming\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_clone_and_merge() {
        let driver = FakeVcsDriver::new();
        let mut base_tree = Tree::new();
        base_tree.insert("a.txt".to_owned(), b"base\n".to_vec());
        driver.seed_remote("https://example/up.git", base_tree.clone());

        let dest = PathBuf::from("/fake/repo");
        driver.clone("https://example/up.git", &dest, CloneFilter::BlobNone).unwrap();
        assert_eq!(driver.file(&dest, "a.txt"), Some(b"base\n".to_vec()));

        let mut theirs = Tree::new();
        theirs.insert("a.txt".to_owned(), b"base\n".to_vec());
        theirs.insert("b.txt".to_owned(), b"new\n".to_vec());
        driver.seed_commit("1111111111111111111111111111111111aaaa", theirs, base_tree);

        let outcome = driver
            .merge_no_ff(&dest, "1111111111111111111111111111111111aaaa", "Merge feature into wip", Identity::ci(1))
            .unwrap();
        assert!(outcome.is_ok());
        assert_eq!(driver.file(&dest, "b.txt"), Some(b"new\n".to_vec()));
    }

    #[test]
    fn conflicting_merge_produces_diff3_markers() {
        let driver = FakeVcsDriver::new();
        let mut base_tree = Tree::new();
        base_tree.insert("a.txt".to_owned(), b"base\n".to_vec());
        driver.seed_remote("https://example/up.git", base_tree.clone());

        let dest = PathBuf::from("/fake/repo2");
        driver.clone("https://example/up.git", &dest, CloneFilter::BlobNone).unwrap();

        // Simulate a prior local edit to a.txt before merging.
        {
            let mut state = driver.state.lock().unwrap();
            state.repos.get_mut(&dest).unwrap().files.insert("a.txt".to_owned(), b"ours\n".to_vec());
        }

        let mut theirs = Tree::new();
        theirs.insert("a.txt".to_owned(), b"theirs\n".to_vec());
        driver.seed_commit("2222222222222222222222222222222222bbbb", theirs, base_tree);

        let outcome = driver
            .merge_no_ff(&dest, "2222222222222222222222222222222222bbbb", "Merge other into wip", Identity::ci(1))
            .unwrap();
        match outcome {
            MergeOutcome::Conflicted { paths } => assert_eq!(paths, vec!["a.txt".to_owned()]),
            MergeOutcome::Ok => panic!("expected conflict"),
        }
        let content = driver.file(&dest, "a.txt").unwrap();
        let text = String::from_utf8(content).unwrap();
        assert!(text.starts_with("<<<<<<<"));
        assert!(text.contains("|||||||"));
        assert!(text.contains("======="));
        assert!(text.contains(">>>>>>>"));
    }
}
