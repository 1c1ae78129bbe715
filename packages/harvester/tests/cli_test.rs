//! Command-line behavior of the harvester binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_sources_lists_registered_strategies() {
    Command::cargo_bin("literature-harvester")
        .unwrap()
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("bhl"))
        .stdout(predicate::str::contains("bibdigital"))
        .stdout(predicate::str::contains("zobodat"));
}

#[test]
fn test_run_with_missing_config_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("literature-harvester")
        .unwrap()
        .current_dir(dir.path())
        .args(["run", "--config", "missing.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("missing.yml"));
}

#[test]
fn test_run_with_unknown_source_name_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("harvesting.yml");
    std::fs::write(
        &config,
        format!(
            "General:\n  output-path: {}\nHarvesters:\n  - Zobodat:\n      items: []\n",
            dir.path().join("out").display()
        ),
    )
    .unwrap();

    Command::cargo_bin("literature-harvester")
        .unwrap()
        .args(["run", "--config"])
        .arg(&config)
        .args(["--source", "bhl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no harvester named 'bhl'"));
}

#[test]
fn test_run_without_harvesters_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("harvesting.yml");
    std::fs::write(
        &config,
        format!("General:\n  output-path: {}\n", dir.path().join("out").display()),
    )
    .unwrap();

    Command::cargo_bin("literature-harvester")
        .unwrap()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No harvesters configured."));
}
