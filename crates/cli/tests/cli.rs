use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn pfix() -> Command {
    Command::cargo_bin("pfix").unwrap()
}

/// Write a small, fast configuration with a fixed seed.
fn init_small(config: &Path) {
    pfix()
        .arg("init")
        .arg("--output")
        .arg(config)
        .args(["--trials", "20", "--capacity", "10", "--seed", "7"])
        .assert()
        .success();
}

#[test]
fn test_init_creates_config() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");

    pfix()
        .arg("init")
        .arg("--output")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written to"))
        .stdout(predicate::str::contains("Trials: 1000"));

    let text = std::fs::read_to_string(&config).unwrap();
    assert!(text.contains("\"fixed_or_lost\""));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");
    init_small(&config);

    pfix()
        .arg("init")
        .arg("--output")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    pfix()
        .arg("init")
        .arg("--output")
        .arg(&config)
        .arg("--force")
        .assert()
        .success();
}

#[test]
fn test_init_legacy_file() {
    let temp = tempdir().unwrap();
    let params = temp.path().join("params.txt");

    pfix()
        .arg("init")
        .arg("--legacy")
        .arg("--output")
        .arg(&params)
        .args(["--trials", "5"])
        .assert()
        .success();

    let text = std::fs::read_to_string(&params).unwrap();
    assert!(text.contains("trials = 5"));
    assert!(text.contains("log_chg_rate_s1 = "));
}

#[test]
fn test_init_rejects_invalid_values() {
    let temp = tempdir().unwrap();
    pfix()
        .arg("init")
        .arg("--output")
        .arg(temp.path().join("bad.json"))
        .args(["--capacity", "5", "--tracked", "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_run_prints_probability_first() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");
    init_small(&config);

    let output = pfix()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let first = stdout.lines().next().unwrap();
    let p: f64 = first.parse().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert!(stdout.contains("Fixation probability"));
}

#[test]
fn test_run_is_reproducible() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");
    init_small(&config);

    let run = |threads: &str| {
        let output = pfix()
            .args(["--threads", threads, "run", "--config"])
            .arg(&config)
            .output()
            .unwrap();
        String::from_utf8(output.stdout).unwrap()
    };
    assert_eq!(run("1"), run("4"));
}

#[test]
fn test_run_legacy_parameters() {
    let temp = tempdir().unwrap();
    let params = temp.path().join("params.txt");
    pfix()
        .arg("init")
        .arg("--legacy")
        .arg("--output")
        .arg(&params)
        .args(["--trials", "10", "--capacity", "8", "--seed", "3"])
        .assert()
        .success();

    pfix()
        .arg("run")
        .arg("--config")
        .arg(&params)
        .assert()
        .success()
        .stdout(predicate::str::contains("Trials: 10"));
}

#[test]
fn test_run_missing_config_fails() {
    let temp = tempdir().unwrap();
    pfix()
        .arg("run")
        .arg("--config")
        .arg(temp.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn test_run_writes_tsv() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");
    let tsv = temp.path().join("series");
    init_small(&config);

    pfix()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .args(["--trials", "3"])
        .arg("--tsv")
        .arg(&tsv)
        .assert()
        .success();

    let text = std::fs::read_to_string(tsv.join("trial_00002.tsv")).unwrap();
    assert!(text.starts_with("generations\ttime\tmean_birth_rate\tstate_0"));
    assert!(text.lines().count() >= 3);
}

#[test]
fn test_database_info_and_export() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pfix.json");
    let db = temp.path().join("run.db");
    init_small(&config);

    pfix()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--database")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Results recorded to"));

    pfix()
        .arg("info")
        .arg("--database")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcomes (20 trials recorded)"))
        .stdout(predicate::str::contains("Master seed: 7"));

    let out = temp.path().join("trial0.tsv");
    pfix()
        .arg("export")
        .arg("--database")
        .arg(&db)
        .args(["--trial", "0", "--output"])
        .arg(&out)
        .assert()
        .success();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("generations\t"));

    pfix()
        .arg("export")
        .arg("--database")
        .arg(&db)
        .args(["--trial", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No time series"));
}

#[test]
fn test_info_missing_database() {
    let temp = tempdir().unwrap();
    pfix()
        .arg("info")
        .arg("--database")
        .arg(temp.path().join("missing.db"))
        .assert()
        .failure();
}
