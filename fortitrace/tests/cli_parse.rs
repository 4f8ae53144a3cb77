use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn fortitrace() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("fortitrace"))
}

#[test]
fn parse_reports_banner_and_object_counts() {
    fortitrace()
        .arg("parse")
        .arg(fixture("fixtures/basic.conf"))
        .assert()
        .success()
        .stdout(predicate::str::contains("platform=FGT60F"))
        .stdout(predicate::str::contains("version=v7.2.5,build1517"))
        .stdout(predicate::str::contains("- address: 4"))
        .stdout(predicate::str::contains("- policy: 3"))
        .stdout(predicate::str::contains("generic: router ospf"));
}

#[test]
fn parse_json_lists_vdom_scopes() {
    let output = fortitrace()
        .arg("parse")
        .arg(fixture("fixtures/vdom.conf"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run parse");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["vdom_mode"], true);
    let scopes: Vec<&str> = report["scopes"]
        .as_array()
        .expect("scopes")
        .iter()
        .filter_map(|s| s["scope"].as_str())
        .collect();
    assert_eq!(scopes, vec!["global", "vdom:dmz", "vdom:root"]);
}

#[test]
fn malformed_block_is_skipped_with_a_warning() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("bad.conf");
    fs::write(
        &path,
        "config firewall address\n    edit \"a\"\n        set subnet 10.0.0.0 255.0.0.0\n    next\nend\nstray line here\nconfig firewall service custom\n    edit \"s\"\n        set tcp-portrange 22\n    next\nend\n",
    )
    .expect("write fixture");

    fortitrace()
        .arg("parse")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("- address: 1"))
        .stdout(predicate::str::contains("- service: 1"))
        .stdout(predicate::str::contains("stray line here"));
}

#[test]
fn missing_file_fails_with_path_in_error() {
    fortitrace()
        .arg("parse")
        .arg(fixture("fixtures/does-not-exist.conf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"))
        .stderr(predicate::str::contains("does-not-exist.conf"));
}

#[test]
fn extra_aliases_route_renamed_sections_to_typed_handlers() {
    let dir = tempdir().expect("tempdir");
    let aliases = dir.path().join("aliases.toml");
    fs::write(
        &aliases,
        "[[alias]]\nfrom = \"firewall address-legacy\"\nto = \"firewall address\"\n",
    )
    .expect("write aliases");
    let config = dir.path().join("fw.conf");
    fs::write(
        &config,
        "config firewall address-legacy\n    edit \"old\"\n        set subnet 10.1.0.0 255.255.0.0\n    next\nend\n",
    )
    .expect("write config");

    fortitrace()
        .arg("--aliases-file")
        .arg(&aliases)
        .arg("parse")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("- address: 1"));
}
