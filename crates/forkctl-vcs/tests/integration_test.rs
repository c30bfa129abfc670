use std::path::Path;

use forkctl_vcs::{CloneFilter, Identity, MergeOutcome, ProcessVcsDriver, VcsDriver};
use tempfile::TempDir;

/// Skip process-backed tests when no `git` binary is on `PATH` (e.g. a
/// minimal container image).
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

#[test]
fn set_option_and_commit_roundtrip() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let driver = ProcessVcsDriver::new();
    driver.set_option(dir.path(), "merge.conflictStyle", "diff3").unwrap();
    driver.set_option(dir.path(), "core.abbrev", "40").unwrap();

    std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
    driver.stage_all(dir.path()).unwrap();
    driver.commit(dir.path(), "initial", Identity::ci(1_700_000_000)).unwrap();

    let head = driver.rev_parse(dir.path(), "HEAD").unwrap();
    assert_eq!(head.len(), 40);
    assert!(driver.diff_quiet(dir.path(), &head, None, false).unwrap());
}

#[test]
fn current_branch_after_create_branch() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let driver = ProcessVcsDriver::new();
    std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
    driver.stage_all(dir.path()).unwrap();
    driver.commit(dir.path(), "initial", Identity::ci(1)).unwrap();

    driver.create_branch(dir.path(), "wip").unwrap();
    assert_eq!(driver.current_branch(dir.path()).unwrap(), "wip");
}

#[test]
fn merge_no_ff_conflict_then_continue() {
    if !git_available() {
        return;
    }
    let dir = init_repo();
    let driver = ProcessVcsDriver::new();
    driver.set_option(dir.path(), "merge.conflictStyle", "diff3").unwrap();

    std::fs::write(dir.path().join("a.txt"), b"base\n").unwrap();
    driver.stage_all(dir.path()).unwrap();
    driver.commit(dir.path(), "base", Identity::ci(1)).unwrap();
    driver.create_branch(dir.path(), "wip").unwrap();

    run(dir.path(), &["checkout", "-b", "feature"]);
    std::fs::write(dir.path().join("a.txt"), b"feature\n").unwrap();
    run(dir.path(), &["commit", "-am", "feature change"]);
    let feature_sha = driver.rev_parse(dir.path(), "feature").unwrap();

    driver.checkout(dir.path(), "wip").unwrap();
    std::fs::write(dir.path().join("a.txt"), b"wip\n").unwrap();
    run(dir.path(), &["commit", "-am", "wip change"]);

    let outcome = driver.merge_no_ff(dir.path(), &feature_sha, "Merge feature into wip", Identity::ci(2)).unwrap();
    match outcome {
        MergeOutcome::Conflicted { paths } => assert_eq!(paths, vec!["a.txt".to_owned()]),
        MergeOutcome::Ok => panic!("expected a conflict"),
    }

    std::fs::write(dir.path().join("a.txt"), b"resolved\n").unwrap();
    driver.stage_all(dir.path()).unwrap();
    driver.write_merge_msg(dir.path(), "Merge feature into wip").unwrap();
    driver.merge_continue_noedit(dir.path(), Identity::ci(3)).unwrap();

    assert!(driver.list_unmerged(dir.path()).unwrap().is_empty());
    let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
    assert_eq!(content, "resolved\n");
}

#[test]
fn clone_applies_filter_arg() {
    if !git_available() {
        return;
    }
    let upstream = init_repo();
    std::fs::write(upstream.path().join("a.txt"), b"hello\n").unwrap();
    run(upstream.path(), &["add", "-A"]);
    run(upstream.path(), &["commit", "-m", "initial"]);

    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");
    let driver = ProcessVcsDriver::new();
    driver.clone(&upstream.path().to_string_lossy(), &dest, CloneFilter::None).unwrap();
    assert!(dest.join("a.txt").exists());
}
