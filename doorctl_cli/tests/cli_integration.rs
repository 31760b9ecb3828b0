use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Minimal valid TOML config for the simulated door
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[pins]
# pins are unused by the sim backend but must be present
trigger = 23
echo = 24
motor = 17

[logging]
level = "warn"

[sim]
noise_cm = 0
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn doorctl(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("doorctl").unwrap();
    // Always include a config to avoid relying on the default path
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["markers"], 0, "5;50;180;300;0.00;0.00;0.00", "stdout")]
#[case(&["self-check"], 0, "self-check ok: distance", "stdout")]
#[case(&["learn-range"], 2, "required", "stderr")]
#[case(&["markers", "--set", "1;2;3"], 4, "expected 7 fields", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let assert = doorctl(&cfg).args(args).assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn self_check_reads_the_simulated_door() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    doorctl(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"distance 2[45]\d cm").unwrap());
}

#[test]
fn self_check_without_echo_is_a_hardware_failure() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "closed_cm = 500");
    doorctl(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No echo"));
}

#[test]
fn invalid_config_names_the_field() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[ranging]\nstressed_hz = 0");
    doorctl(&cfg)
        .arg("markers")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stressed_hz"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("nope.toml");
    doorctl(&cfg)
        .arg("markers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("read config"));
}

#[test]
fn markers_round_trip_through_the_store() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("state");
    let extra = format!("[storage]\ndir = {:?}", store.display().to_string());
    let cfg = write_config(&dir, &extra);

    doorctl(&cfg)
        .args(["markers", "--set", "10;40;200;260;14.5;1.2;0.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10;40;200;260;14.50;1.20;0.80"));
    assert!(store.join("calib.bin").exists());

    doorctl(&cfg)
        .arg("markers")
        .assert()
        .success()
        .stdout(predicate::str::contains("10;40;200;260;14.50;1.20;0.80"));
}

#[test]
fn overlapping_markers_are_refused() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("state");
    let extra = format!("[storage]\ndir = {:?}", store.display().to_string());
    let cfg = write_config(&dir, &extra);

    doorctl(&cfg)
        .args(["markers", "--set", "100;200;150;250;0;0;0"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("overlaps"));
    assert!(!store.join("calib.bin").exists());
}

#[test]
fn set_markers_needs_a_store() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    doorctl(&cfg)
        .args(["markers", "--set", "10;40;200;260;0;0;0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[storage].dir"));
}

#[test]
fn learn_range_from_a_quiet_dump() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let dump = dir.path().join("dump.txt");
    fs::write(&dump, "0;249;0\n1;250;0\n2;251;0\n3;0;22\n").unwrap();

    doorctl(&cfg)
        .arg("learn-range")
        .arg("--dump")
        .arg(&dump)
        .args(["--side", "closed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed: 245..=255"));
}

#[test]
fn learn_range_refuses_noisy_samples() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let dump = dir.path().join("dump.txt");
    fs::write(&dump, "0;200;0\n1;250;0\n2;300;0\n").unwrap();

    doorctl(&cfg)
        .arg("learn-range")
        .arg("--dump")
        .arg(&dump)
        .args(["--side", "open"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too noisy"));
}

#[test]
fn run_reports_the_closed_door() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    doorctl(&cfg)
        .args(["run", "--seconds", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hub current=Closed"))
        .stdout(predicate::str::contains("door=Closed"));
}

#[test]
fn run_opens_on_stdin_command() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "travel_ms = 1500");
    doorctl(&cfg)
        .args(["run", "--seconds", "5", "--stdin"])
        .write_stdin("open\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("hub current=Open"))
        .stdout(predicate::str::contains("door=Open"));
}
