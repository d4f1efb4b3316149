use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn forge() -> Command {
    Command::cargo_bin("forge").unwrap()
}

#[test]
fn init_scaffolds_the_workspace() {
    let dir = TempDir::new().unwrap();

    forge()
        .args(["--root", dir.path().to_str().unwrap(), "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".forge/agents.yaml"));

    assert!(dir.path().join(".forge/config.yaml").exists());
    assert!(dir.path().join(".forge/agents.yaml").exists());

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".forge/tasks.db"));
    assert!(gitignore.contains(".forge/memory.json"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    forge().args(["--root", &root, "init"]).assert().success();

    // Customize the roster, then re-init: the file must survive.
    let roster_path = dir.path().join(".forge/agents.yaml");
    let mut roster = std::fs::read_to_string(&roster_path).unwrap();
    roster.push_str("  custom_agent:\n    role: custom role\n    allowed_tools: []\n");
    std::fs::write(&roster_path, &roster).unwrap();

    forge()
        .args(["--root", &root, "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));

    let after = std::fs::read_to_string(&roster_path).unwrap();
    assert!(after.contains("custom_agent"));
}

#[test]
fn tasks_on_fresh_workspace_reports_none() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    forge().args(["--root", &root, "init"]).assert().success();
    forge()
        .args(["--root", &root, "tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks recorded."));
}

#[test]
fn tasks_without_init_fails() {
    let dir = TempDir::new().unwrap();

    forge()
        .args(["--root", dir.path().to_str().unwrap(), "tasks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("forge init"));
}

#[test]
fn memory_on_fresh_workspace_reports_none() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    forge().args(["--root", &root, "init"]).assert().success();
    forge()
        .args(["--root", &root, "memory"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No memory entries."));
}

#[test]
fn generate_rejects_conflicting_flags() {
    let dir = TempDir::new().unwrap();

    forge()
        .args([
            "--root",
            dir.path().to_str().unwrap(),
            "generate",
            "a.py",
            "--desc",
            "x",
            "--triad",
            "--run",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn config_reports_settings() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    forge().args(["--root", &root, "init"]).assert().success();
    forge()
        .args(["--root", &root, "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interpreter:  python3"));
}
