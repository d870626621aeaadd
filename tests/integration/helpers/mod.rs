//! Helpers for driving the smig binary

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// A project directory with its own `smig.toml`.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    /// Project using the default config (JSON history).
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Project whose config selects the sqlite history backend.
    pub fn with_sqlite_history() -> Self {
        let project = Self::new();
        project.write_config("[history]\nbackend = \"sqlite\"\n");
        project
    }

    pub fn write_config(&self, contents: &str) {
        fs::write(self.config_path(), contents).expect("Failed to write config");
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("smig.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("portfolio.db")
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.path().join("migrations").join("migrations.json")
    }

    /// `smig` command running inside the project directory.
    pub fn smig(&self) -> Command {
        let mut cmd = Command::cargo_bin("smig").expect("smig binary");
        cmd.current_dir(self.dir.path())
            .env_remove("SMIG_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    /// Run `smig` with `args` and return stdout, asserting success.
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.smig().args(args).assert().success().get_output().clone();
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}
