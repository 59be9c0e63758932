//! Output and exit-code contract for the `cmp` binary.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

const CONFIG: &str = r#"
catalog:
  purposes:
    - id: ads
    - id: analytics
      default_allowed: true
  vendors:
    - id: v1
      purpose_ids: [analytics]
    - id: v2
      purpose_ids: [ads, analytics]
consent_mode:
  ads: [ad_storage, ad_user_data]
  analytics: [analytics_storage]
"#;

/// ads rejected, analytics allowed, v1 pinned, v2 rejected, ATT denied.
const GOLDEN_MIXED: &str = "AQAAAZwEC60AAgACA2FkcwIJYW5hbHl0aWNzAQACAnYxggJ2MgIjjxmQ";

const RECORD: &str = r#"{
  "version": 1,
  "purpose_decisions": {"analytics": "allowed", "ads": "rejected"},
  "vendor_decisions": {"v1": "rejected", "v2": "rejected"},
  "vendor_pins": ["v1"],
  "timestamp": "2026-01-28T10:00:00Z",
  "att_status": "denied"
}"#;

fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("cmp.yaml"), CONFIG).unwrap();
    dir
}

fn cmp(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cmp").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CMP_EVENT_SOURCE")
        .env_remove("CMP_ATT_GATES_AD_SIGNALS");
    cmd
}

#[test]
fn contract_validate_ok() {
    let dir = workspace();
    cmp(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ok: 2 purposes, 2 vendors, 2 consent mode mappings",
        ));
}

#[test]
fn contract_validate_bad_config_exits_2() {
    let dir = workspace();
    fs::write(
        dir.path().join("bad.yaml"),
        "catalog:\n  vendors:\n    - id: v1\n      purpose_ids: [ghost]\n",
    )
    .unwrap();
    cmp(&dir)
        .args(["validate", "--config", "bad.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E_INVALID_CONFIG"));

    cmp(&dir)
        .args(["validate", "--config", "missing.yaml"])
        .assert()
        .code(2);
}

#[test]
fn contract_decode_json() {
    let dir = workspace();
    let output = cmp(&dir)
        .args(["decode", GOLDEN_MIXED, "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(v["version"], 1);
    assert_eq!(v["att_status"], "denied");
    assert_eq!(v["purposes"]["analytics"], "allowed");
    assert_eq!(v["vendors"]["v2"], "rejected");
    assert_eq!(v["pinned_vendors"], serde_json::json!(["v1"]));
}

#[test]
fn contract_decode_table() {
    let dir = workspace();
    cmp(&dir)
        .args(["decode", GOLDEN_MIXED])
        .assert()
        .success()
        .stdout(predicate::str::contains("(pinned)"))
        .stdout(predicate::str::contains("Allowed"));
}

#[test]
fn contract_decode_errors_exit_1() {
    let dir = workspace();
    cmp(&dir)
        .args(["decode", "!!not-base64!!"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E_DECODE"));

    // version byte 2
    cmp(&dir)
        .args([
            "decode",
            "AgAAAZwEC60AAgACA2FkcwIJYW5hbHl0aWNzAQACAnYxggJ2MgIjjxmQ",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported consent string version 2"));
}

#[test]
fn contract_encode_matches_golden() {
    let dir = workspace();
    fs::write(dir.path().join("record.json"), RECORD).unwrap();
    cmp(&dir)
        .args(["encode", "--record", "record.json"])
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{GOLDEN_MIXED}\n")));
}

#[test]
fn contract_encode_rejects_unknown_ids() {
    let dir = workspace();
    let record = RECORD.replace("\"v2\"", "\"ghost\"");
    fs::write(dir.path().join("record.json"), record).unwrap();
    cmp(&dir)
        .args(["encode", "--record", "record.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E_INVALID_RECORD"));
}

#[test]
fn contract_signals() {
    let dir = workspace();
    let output = cmp(&dir)
        .args(["signals", GOLDEN_MIXED])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(v["consent_mode"]["analytics_storage"], "granted");
    assert_eq!(v["consent_mode"]["ad_storage"], "denied");
    assert_eq!(v["att"]["tracking_permitted"], false);
    assert_eq!(v["att"]["settings_redirect_recommended"], true);
}

#[test]
fn contract_signals_import_error_exits_1() {
    let dir = workspace();
    cmp(&dir)
        .args(["signals", "AAAA"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E_IMPORT"));
}
