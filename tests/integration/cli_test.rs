//! End-to-end CLI behaviour

use predicates::prelude::*;
use rusqlite::Connection;

use smig::{Direction, HistoryStore, JsonFileHistory};

use crate::helpers::Project;

#[test]
fn init_is_idempotent() {
    let project = Project::new();
    project
        .smig()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized migration history"));
    assert!(project.history_path().exists());
    assert!(project.config_path().exists());
    let written = smig::Config::load(&project.config_path()).unwrap();
    assert_eq!(written, smig::Config::default());

    project
        .smig()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn up_before_init_fails() {
    let project = Project::new();
    project
        .smig()
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn up_status_down_cycle() {
    let project = Project::new();
    project.run_ok(&["init"]);

    let out = project.run_ok(&["up"]);
    assert!(out.contains("Applied 001_init"));
    assert!(out.contains("Applied 002_add_index"));
    assert!(out.contains("Current version: 002_add_index"));

    let status = project.run_ok(&["status"]);
    assert!(status.contains("IDENTITY"));
    assert!(status.contains("2 applied, 0 pending"));

    project
        .smig()
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to migrate"));

    let out = project.run_ok(&["down"]);
    assert!(out.contains("Reverted 002_add_index"));
    assert!(out.contains("Current version: 001_init"));

    let out = project.run_ok(&["down", "5"]);
    assert!(out.contains("Reverted 001_init"));
    assert!(out.contains("Requested 5 but only 1 were applied"));
    assert!(out.contains("Current version: none"));

    let conn = Connection::open(project.database_path()).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'contact_messages'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn up_to_and_down_to() {
    let project = Project::new();
    project.run_ok(&["init"]);

    let out = project.run_ok(&["up", "--to", "001_init"]);
    assert!(out.contains("Current version: 001_init"));
    assert_eq!(project.run_ok(&["version"]).trim(), "001_init");

    project.run_ok(&["up"]);
    let out = project.run_ok(&["down", "--to", "001_init"]);
    assert!(out.contains("Reverted 002_add_index"));
    assert!(!out.contains("Reverted 001_init"));

    project
        .smig()
        .args(["up", "--to", "999_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown migration '999_missing'"));
}

#[test]
fn version_and_check() {
    let project = Project::new();
    project.run_ok(&["init"]);
    assert_eq!(project.run_ok(&["version"]).trim(), "none");

    project.smig().arg("check").assert().failure();

    project.run_ok(&["up", "1"]);
    project.smig().args(["check", "--expect", "001_init"]).assert().success();
    project
        .smig()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("002_add_index is expected"));

    project.run_ok(&["up"]);
    project
        .smig()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date at 002_add_index"));
}

fn entries(project: &Project) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(project.dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn reporting_commands_leave_a_fresh_directory_untouched() {
    let project = Project::new();
    project
        .smig()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not initialized"));
    assert_eq!(project.run_ok(&["version"]).trim(), "none");
    project.smig().arg("check").assert().failure();

    assert!(entries(&project).is_empty());
}

#[test]
fn reporting_commands_create_nothing_with_sqlite_history() {
    let project = Project::with_sqlite_history();
    project.run_ok(&["status"]);
    assert_eq!(project.run_ok(&["version"]).trim(), "none");
    project.smig().arg("check").assert().failure();

    assert_eq!(entries(&project), vec!["smig.toml".to_string()]);
}

#[test]
fn sqlite_history_backend() {
    let project = Project::with_sqlite_history();
    project.run_ok(&["init"]);
    project.run_ok(&["up"]);
    assert!(!project.history_path().exists());
    assert_eq!(project.run_ok(&["version"]).trim(), "002_add_index");

    let conn = Connection::open(project.database_path()).unwrap();
    let recorded: i64 = conn
        .query_row("SELECT COUNT(*) FROM _smig_history", [], |row| row.get(0))
        .unwrap();
    assert_eq!(recorded, 2);
}

#[test]
fn database_flag_overrides_config() {
    let project = Project::new();
    project.run_ok(&["init", "--database", "other.db"]);
    project.run_ok(&["up", "--database", "other.db"]);
    assert!(project.dir.path().join("other.db").exists());
    assert!(!project.database_path().exists());
}

#[test]
fn relative_paths_follow_the_config_file() {
    let project = Project::new();
    let nested = project.dir.path().join("conf");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(
        nested.join("smig.toml"),
        "[database]\npath = \"db/app.db\"\n[history]\npath = \"state/history.json\"\n",
    )
    .unwrap();

    project.run_ok(&["--config", "conf/smig.toml", "init"]);
    project.run_ok(&["--config", "conf/smig.toml", "up"]);
    assert!(nested.join("db/app.db").exists());
    assert!(nested.join("state/history.json").exists());
}

#[test]
fn invalid_config_is_reported() {
    let project = Project::new();
    project.write_config("[history]\nbackend = \"redis\"\n");
    project
        .smig()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn interrupted_migration_blocks_until_resolved() {
    let project = Project::new();
    project.run_ok(&["init"]);
    project.run_ok(&["up", "1"]);

    let mut history = JsonFileHistory::open(project.history_path()).unwrap();
    history.begin("002_add_index", Direction::Up).unwrap();
    drop(history);

    project
        .smig()
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interrupted"));
    project
        .smig()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("002_add_index was interrupted going up"));

    project
        .smig()
        .args(["resolve", "reverted"])
        .assert()
        .success()
        .stdout(predicate::str::contains("history unchanged"));
    let out = project.run_ok(&["up"]);
    assert!(out.contains("Applied 002_add_index"));
}

#[test]
fn resolve_without_interruption_fails() {
    let project = Project::new();
    project.run_ok(&["init"]);
    project
        .smig()
        .args(["resolve", "applied"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No interrupted migration"));
}

#[test]
fn logs_go_to_stderr() {
    let project = Project::new();
    project
        .smig()
        .args(["--log-level", "info", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INFO").not())
        .stderr(predicate::str::contains("history store initialized"));
}
