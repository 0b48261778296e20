//! Scenario: one-shot `vfl reconcile` / `vfl validate` / `vfl config-hash`
//!
//! # Invariants under test
//!
//! 1. `config-hash` prints a 64-hex hash line followed by canonical JSON.
//! 2. `reconcile` prints the closing table: 500.0 - 20.0 + 100.0 -> 580.0.
//! 3. An unbalanced bunkering is reported, the tank is untouched and the
//!    period is not acceptable, but the command itself succeeds.
//! 4. `validate` prints a slip warning for a slip that disagrees with the
//!    distances.
//! 5. `--strict-config` refuses a config with keys nothing reads.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

const CONFIG: &str = r#"
vessel: { name: MV TEST }
tanks:
  - { id: A, capacity: { mass: 1000.0 }, grade: HFO }
  - { id: B, capacity: { mass: 1000.0 }, grade: HFO }
consumers:
  - { id: ME, name: Main engine }
"#;

const OPENING: &str = r#"{ "tanks": { "A": { "rob": 500.0, "grade": "HFO" }, "B": { "rob": 0.0, "grade": "HFO" } } }"#;

fn period_json(bunkered: f64, allocated: f64) -> String {
    format!(
        r#"{{
  "key": {{ "vessel": "MV TEST", "leg": "L1", "report_time": "2026-05-01T12:00:00Z" }},
  "report_type": "NOON",
  "consumption": [ {{ "consumer": "ME", "tank": "A", "quantity": 20.0 }} ],
  "bunkerings": [ {{
    "bdn_number": "BDN-1",
    "delivered_at": "2026-05-01T08:00:00Z",
    "grade": "HFO",
    "mass": {bunkered},
    "allocations": [ {{ "tank": "A", "quantity": {allocated} }} ]
  }} ],
  "fields": {{ "engine_distance_nm": 220.0, "observed_distance_nm": 209.0, "slip_pct": 9.0 }}
}}"#
    )
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, content).unwrap();
    p
}

fn vfl() -> Command {
    Command::cargo_bin("vfl").unwrap()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let out = cmd.output().unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "vessel.yaml", CONFIG);

    vfl()
        .args(["config-hash", cfg.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^config_hash=[0-9a-f]{64}\n").unwrap())
        .stdout(predicate::str::contains(r#""vessel":{"name":"MV TEST"}"#));
}

#[test]
fn reconcile_prints_closing_table() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "vessel.yaml", CONFIG);
    let opening = write(dir.path(), "opening.json", OPENING);
    let period = write(dir.path(), "p1.json", &period_json(100.0, 100.0));

    let v = stdout_json(vfl().args([
        "reconcile",
        "--config",
        cfg.to_str().unwrap(),
        "--opening",
        opening.to_str().unwrap(),
        "--period",
        period.to_str().unwrap(),
    ]));

    assert_eq!(v["acceptable"], true);
    assert_eq!(v["ledger"]["closing"]["tanks"]["A"]["rob"], 580.0);
    assert_eq!(v["ledger"]["totals"]["bunkered"], 100.0);
    assert_eq!(v["config_hash"].as_str().map(str::len), Some(64));
}

#[test]
fn reconcile_reports_unbalanced_bunkering() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "vessel.yaml", CONFIG);
    let opening = write(dir.path(), "opening.json", OPENING);
    let period = write(dir.path(), "p1.json", &period_json(50.0, 49.5));

    let v = stdout_json(vfl().args([
        "reconcile",
        "--config",
        cfg.to_str().unwrap(),
        "--opening",
        opening.to_str().unwrap(),
        "--period",
        period.to_str().unwrap(),
    ]));

    assert_eq!(v["acceptable"], false);
    assert_eq!(v["ledger"]["issues"][0]["issue"], "UNBALANCED_BUNKERING");
    assert_eq!(v["ledger"]["closing"]["tanks"]["A"]["rob"], 480.0);
}

#[test]
fn validate_prints_slip_warning() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "vessel.yaml", CONFIG);
    let period = write(dir.path(), "p1.json", &period_json(100.0, 100.0));

    let v = stdout_json(vfl().args([
        "validate",
        "--config",
        cfg.to_str().unwrap(),
        "--period",
        period.to_str().unwrap(),
    ]));

    let findings = v.as_array().unwrap();
    assert!(
        findings
            .iter()
            .any(|f| f["rule_id"] == "SLIP_DERIVED" && f["severity"] == "warning"),
        "{v}"
    );
}

#[test]
fn strict_config_refuses_unused_keys() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(
        dir.path(),
        "vessel.yaml",
        &format!("{CONFIG}\nreconcile:\n  strict: true\n"),
    );
    let period = write(dir.path(), "p1.json", &period_json(100.0, 100.0));

    vfl()
        .args([
            "validate",
            "--strict-config",
            "--config",
            cfg.to_str().unwrap(),
            "--period",
            period.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}
