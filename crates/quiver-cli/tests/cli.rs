//! End-to-end tests for the quiver CLI binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Test context that sets up a temporary quiver home
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".quiver");
        Self { temp_dir, home }
    }

    fn recipes(&self, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.temp_dir.path().join("recipes");
        std::fs::create_dir_all(dir.join("pkgs")).expect("failed to create recipes");
        for (name, content) in files {
            std::fs::write(dir.join(format!("pkgs/{name}.toml")), content)
                .expect("failed to write recipe");
        }
        dir
    }

    fn quiver(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_quiver"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("QUIVER_HOME", &self.home);
        // Never reach the network from these tests.
        cmd.env("QUIVER_RECIPES_URL", "http://127.0.0.1:9/recipes.tar.gz");
        cmd.env("QUIVER_GITHUB_API", "http://127.0.0.1:9");
        cmd.env_remove("GITHUB_TOKEN");
        cmd
    }
}

const JQ: &str = r#"
[package]
title = "jq"

[versions]
manual = ["1.7.1"]

[download]
url = "http://127.0.0.1:9/{{version}}/{{stem}}"
stem = "jq-{{os}}-{{arch}}"
raw_binary = true

[platforms.linux]
[platforms.mac]
[platforms.win]

[arch]
amd64 = "amd64"
arm64 = "arm64"
"#;

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.quiver().arg("--help").output().expect("failed to run quiver");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("add"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .quiver()
        .arg("--version")
        .output()
        .expect("failed to run quiver");
    assert!(output.status.success());
}

#[test]
fn test_malformed_argument_fails() {
    let ctx = TestContext::new();
    let recipes = ctx.recipes(&[("jq", JQ)]);
    let output = ctx
        .quiver()
        .args(["add", "jq@1@2", "-l"])
        .arg(&recipes)
        .output()
        .expect("failed to run quiver");

    assert!(!output.status.success());
    assert!(!ctx.home.join("pkg/jq").exists());
    assert!(!ctx.home.join("tmp").exists());
}

#[test]
fn test_version_with_path_segments_fails() {
    let ctx = TestContext::new();
    let recipes = ctx.recipes(&[("jq", JQ)]);
    let output = ctx
        .quiver()
        .args(["add", "jq@x/../../../../escaped", "-l"])
        .arg(&recipes)
        .output()
        .expect("failed to run quiver");

    assert!(!output.status.success());
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(combined.contains("invalid package argument"));
    assert!(!ctx.home.join("pkg/jq").exists());
    assert!(!ctx.temp_dir.path().join("escaped").exists());
}

#[test]
fn test_missing_local_recipes_dir_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .quiver()
        .args(["add", "jq", "-l"])
        .arg(ctx.temp_dir.path().join("nope"))
        .output()
        .expect("failed to run quiver");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_unknown_package_fails() {
    let ctx = TestContext::new();
    let recipes = ctx.recipes(&[("jq", JQ)]);
    let output = ctx
        .quiver()
        .args(["add", "does-not-exist", "-l"])
        .arg(&recipes)
        .output()
        .expect("failed to run quiver");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("does-not-exist"));
}

#[test]
fn test_dev_check_valid_recipe() {
    let ctx = TestContext::new();
    let recipes = ctx.recipes(&[("jq", JQ)]);
    let output = ctx
        .quiver()
        .args(["dev", "check", "jq", "-l"])
        .arg(&recipes)
        .output()
        .expect("failed to run quiver");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("jq recipe OK"));
}

#[test]
fn test_dev_check_invalid_recipe() {
    let ctx = TestContext::new();
    let recipes = ctx.recipes(&[("jq", "[package]\ntitle = \"jq\"\n")]);
    let output = ctx
        .quiver()
        .args(["dev", "check", "jq", "-l"])
        .arg(&recipes)
        .output()
        .expect("failed to run quiver");

    assert!(!output.status.success());
}
