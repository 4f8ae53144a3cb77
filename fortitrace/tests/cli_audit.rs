use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn fortitrace() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("fortitrace"))
}

#[test]
fn clean_config_passes_audit() {
    fortitrace()
        .arg("audit")
        .arg(fixture("fixtures/basic.conf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("errors=0 warnings=0"));
}

#[test]
fn broken_references_fail_audit() {
    fortitrace()
        .arg("audit")
        .arg(fixture("fixtures/broken.conf"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("errors=4 warnings=3"))
        .stdout(predicate::str::contains("address group cycle: loop-a -> loop-b -> loop-a"))
        .stdout(predicate::str::contains("undefined interface `port7`"))
        .stdout(predicate::str::contains("undefined address `missing-addr`"))
        .stdout(predicate::str::contains("undefined service `NOPE`"))
        .stdout(predicate::str::contains("undefined member `ghost`"))
        .stdout(predicate::str::contains("undefined interface `port9`"))
        .stdout(predicate::str::contains("undefined device `port8`"))
        .stderr(predicate::str::contains("audit failed: 4 errors"));
}

#[test]
fn audit_json_carries_finding_codes() {
    let output = fortitrace()
        .arg("audit")
        .arg(fixture("fixtures/broken.conf"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run audit");
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let codes: Vec<&str> = report["findings"]
        .as_array()
        .expect("findings")
        .iter()
        .filter_map(|f| f["code"].as_str())
        .collect();
    assert_eq!(
        codes,
        vec![
            "zone_member_missing",
            "group_member_missing",
            "address_group_cycle",
            "policy_reference_missing",
            "policy_reference_missing",
            "policy_reference_missing",
            "route_device_missing",
        ]
    );
}
