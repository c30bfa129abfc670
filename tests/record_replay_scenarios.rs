//! Full-engine scenarios driven against real `git`, mirroring
//! `forkctl-vcs`'s own process-backed integration tests: record against a
//! local upstream, then replay into a fresh clone and check the two HEADs
//! agree byte for byte. Skips entirely when no `git` binary is on `PATH`.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use forkctl::advisor::{Advisor, AdvisorError, ClassifyItem, GenerateItem, Strategy};
use forkctl::config::Entry;
use forkctl::hook::NoopHook;
use forkctl::pins::PinStore;
use forkctl::{lifecycle, record, replay, EngineError};
use forkctl_vcs::ProcessVcsDriver;
use tempfile::TempDir;

fn git_available() -> bool {
    std::process::Command::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    run(dir.path(), &["init", "-b", "main"]);
    run(dir.path(), &["config", "user.email", "test@test.com"]);
    run(dir.path(), &["config", "user.name", "Test User"]);
    dir
}

fn run(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git").args(args).current_dir(dir).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn entry(upstream: &Path, refs: Vec<String>) -> Entry {
    Entry { upstream: upstream.to_string_lossy().into_owned(), fork: None, refs, workspace: None, hook: None }
}

/// An advisor double that panics if consulted — asserts a conflict-free
/// merge (or a replay) never reaches the advisor boundary.
struct NeverAdvisor;

impl Advisor for NeverAdvisor {
    fn classify(&self, _batch: &[ClassifyItem]) -> Result<Vec<Strategy>, AdvisorError> {
        panic!("advisor must not be consulted here");
    }

    fn generate(&self, _batch: &[GenerateItem]) -> Result<Vec<Vec<u8>>, AdvisorError> {
        panic!("advisor must not be consulted here");
    }
}

/// Always defers to Tier 2 generation, counting each RPC it serves.
#[derive(Default)]
struct CountingAdvisor {
    classify_calls: AtomicU32,
    generate_calls: AtomicU32,
}

impl Advisor for CountingAdvisor {
    fn classify(&self, batch: &[ClassifyItem]) -> Result<Vec<Strategy>, AdvisorError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(batch.iter().map(|_| Strategy::Generate).collect())
    }

    fn generate(&self, batch: &[GenerateItem]) -> Result<Vec<Vec<u8>>, AdvisorError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(batch.iter().map(|_| b"merged\n".to_vec()).collect())
    }
}

#[test]
fn record_then_replay_reproduces_head_with_no_conflict() {
    if !git_available() {
        return;
    }

    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"base\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "base"]);

    run(upstream.path(), &["checkout", "-b", "feature"]);
    std::fs::write(upstream.path().join("b.txt"), b"feature\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "feature adds b.txt"]);
    run(upstream.path(), &["checkout", "main"]);

    let workdir = TempDir::new().unwrap();
    let pins_root = workdir.path().join("pins");
    let clones_root = workdir.path().join("clones");
    let mut pins = PinStore::new(&pins_root, "acme");
    let clone_dir = clones_root.join("acme");

    let e = entry(upstream.path(), vec!["feature".to_owned()]);
    let vcs = ProcessVcsDriver::new();
    let hook = NoopHook;

    let outcome = record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &NeverAdvisor, &hook).unwrap();
    assert_eq!(pins.read_head().unwrap(), outcome.head);
    assert!(pins.read_resolution(1).unwrap().is_none());
    assert_eq!(std::fs::read(clone_dir.join("b.txt")).unwrap(), b"feature\n");

    let replay_clone_dir = clones_root.join("acme-replay");
    let replayed = replay::replay("acme", &e, &pins, &replay_clone_dir, &vcs, &hook).unwrap();
    match replayed {
        replay::ReplayOutcome::Replayed { head } => assert_eq!(head, outcome.head),
        other => panic!("expected Replayed, got {other:?}"),
    }
    assert_eq!(std::fs::read(replay_clone_dir.join("b.txt")).unwrap(), b"feature\n");
}

#[test]
fn record_then_replay_reproduces_head_through_a_real_conflict() {
    if !git_available() {
        return;
    }

    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"base\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "base"]);

    run(upstream.path(), &["checkout", "-b", "r1"]);
    std::fs::write(upstream.path().join("a.txt"), b"r1\n").unwrap();
    run(upstream.path(), &["commit", "-am", "r1 edit"]);
    run(upstream.path(), &["checkout", "main"]);

    run(upstream.path(), &["checkout", "-b", "r2"]);
    std::fs::write(upstream.path().join("a.txt"), b"r2\n").unwrap();
    run(upstream.path(), &["commit", "-am", "r2 edit"]);
    run(upstream.path(), &["checkout", "main"]);

    let workdir = TempDir::new().unwrap();
    let pins_root = workdir.path().join("pins");
    let clones_root = workdir.path().join("clones");
    let mut pins = PinStore::new(&pins_root, "acme");
    let clone_dir = clones_root.join("acme");

    // r1 merges cleanly on top of an untouched base; r2 then collides with
    // r1's edit to a.txt, forcing a genuine three-way conflict on the
    // second merge step.
    let e = entry(upstream.path(), vec!["r1".to_owned(), "r2".to_owned()]);
    let vcs = ProcessVcsDriver::new();
    let advisor = CountingAdvisor::default();
    let hook = NoopHook;

    let outcome = record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &advisor, &hook).unwrap();

    assert!(pins.read_resolution(1).unwrap().is_none(), "first merge step has no conflict");
    assert!(pins.read_resolution(2).unwrap().is_some(), "second merge step collides on a.txt");
    assert_eq!(advisor.classify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(advisor.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(clone_dir.join("a.txt")).unwrap(), b"merged\n");

    let replay_clone_dir = clones_root.join("acme-replay");
    let replayed = replay::replay("acme", &e, &pins, &replay_clone_dir, &vcs, &hook).unwrap();
    match replayed {
        replay::ReplayOutcome::Replayed { head } => assert_eq!(head, outcome.head),
        other => panic!("expected Replayed, got {other:?}"),
    }
    assert_eq!(std::fs::read(replay_clone_dir.join("a.txt")).unwrap(), b"merged\n");
}

#[test]
fn save_then_replay_reproduces_the_local_patch_commit() {
    if !git_available() {
        return;
    }

    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"base\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "base"]);

    let workdir = TempDir::new().unwrap();
    let pins_root = workdir.path().join("pins");
    let clones_root = workdir.path().join("clones");
    let mut pins = PinStore::new(&pins_root, "acme");
    let clone_dir = clones_root.join("acme");

    let e = entry(upstream.path(), vec![]);
    let vcs = ProcessVcsDriver::new();
    let hook = NoopHook;

    record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &NeverAdvisor, &hook).unwrap();

    std::fs::write(clone_dir.join("a.txt"), b"base\nlocal change\n").unwrap();
    let saved = lifecycle::save("acme", "add local change", &e, &pins, &clone_dir, &vcs).unwrap();
    let (filename, saved_head) = match saved {
        lifecycle::SaveOutcome::Saved { filename, head } => (filename, head),
        lifecycle::SaveOutcome::NoChanges => panic!("expected a saved local patch"),
    };
    assert!(filename.starts_with("local-001-"), "unexpected filename {filename}");
    assert_eq!(pins.read_head().unwrap(), saved_head);

    let replay_clone_dir = clones_root.join("acme-replay");
    let replayed = replay::replay("acme", &e, &pins, &replay_clone_dir, &vcs, &hook).unwrap();
    match replayed {
        replay::ReplayOutcome::Replayed { head } => assert_eq!(head, saved_head),
        other => panic!("expected Replayed, got {other:?}"),
    }
    assert_eq!(std::fs::read(replay_clone_dir.join("a.txt")).unwrap(), b"base\nlocal change\n");
}

#[test]
fn replay_reports_head_mismatch_against_a_corrupted_pin() {
    if !git_available() {
        return;
    }

    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"base\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "base"]);

    let workdir = TempDir::new().unwrap();
    let pins_root = workdir.path().join("pins");
    let clones_root = workdir.path().join("clones");
    let mut pins = PinStore::new(&pins_root, "acme");
    let clone_dir = clones_root.join("acme");

    let e = entry(upstream.path(), vec![]);
    let vcs = ProcessVcsDriver::new();
    let hook = NoopHook;

    record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &NeverAdvisor, &hook).unwrap();
    pins.write_head(&"0".repeat(40)).unwrap();

    let replay_clone_dir = clones_root.join("acme-replay");
    let err = replay::replay("acme", &e, &pins, &replay_clone_dir, &vcs, &hook).unwrap_err();
    match err {
        EngineError::Failed { detail } => {
            assert!(detail.contains("untouched"), "{detail}");
        }
        other => panic!("expected Failed wrapping a HeadMismatch, got {other:?}"),
    }
    assert!(!replay_clone_dir.exists(), "a failed replay must not leave a partial clone behind");
}

#[test]
fn record_refuses_when_the_clone_is_dirty() {
    if !git_available() {
        return;
    }

    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"base\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "base"]);

    let workdir = TempDir::new().unwrap();
    let pins_root = workdir.path().join("pins");
    let clones_root = workdir.path().join("clones");
    let mut pins = PinStore::new(&pins_root, "acme");
    let clone_dir = clones_root.join("acme");

    let e = entry(upstream.path(), vec![]);
    let vcs = ProcessVcsDriver::new();
    let hook = NoopHook;

    record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &NeverAdvisor, &hook).unwrap();

    std::fs::write(clone_dir.join("a.txt"), b"base\nuncommitted edit\n").unwrap();

    let err = record::record("acme", &[], &e, &mut pins, &clone_dir, &vcs, &NeverAdvisor, &hook).unwrap_err();
    match err {
        EngineError::GuardFailed { reasons } => {
            assert!(reasons.contains("worktree or index differs"), "{reasons}");
        }
        other => panic!("expected GuardFailed, got {other:?}"),
    }
}
