use std::path::{Path, PathBuf};

/// Run git synchronously in `dir`, panicking if it cannot be spawned.
pub fn run_git(dir: &Path, args: &[&str]) -> std::process::Output {
    std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("git {args:?} failed to start: {e}"))
}

/// Initialize a minimal git repository for testing.
///
/// Creates a repo with an initial commit on `main` so that HEAD exists.
pub fn init_test_repo(dir: &Path) {
    run_git(dir, &["init", "--initial-branch=main"]);
    run_git(dir, &["config", "user.email", "test@test.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);

    std::fs::write(dir.join("README"), "test repo").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "-m", "init"]);
}

/// Create an empty bare repository under `parent` to push into.
pub fn init_bare_remote(parent: &Path) -> PathBuf {
    let remote = parent.join("remote.git");
    std::fs::create_dir_all(&remote).unwrap();
    let out = run_git(&remote, &["init", "--bare", "--initial-branch=main"]);
    assert!(out.status.success(), "git init --bare failed");
    remote
}
