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
fn same_subnet_flow_is_delivered() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1.50", "--dst", "192.168.1.99", "--port", "80"])
        .arg("--expect-delivered")
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered via port1"))
        .stdout(predicate::str::contains("policy: 1 (lan-local) accept"))
        .stdout(predicate::str::contains("note: no NAT"));
}

#[test]
fn outbound_flow_is_source_translated() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/nat.conf"))
        .args(["--src", "192.168.1.10", "--dst", "8.8.8.8", "--port", "443"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "SNAT 192.168.1.10 -> 203.0.113.50 via pool outbound",
        ))
        .stdout(predicate::str::contains("Forwarded via wan1 to 203.0.113.1"));
}

#[test]
fn inbound_flow_to_vip_is_destination_translated() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/nat.conf"))
        .args(["--src", "203.0.113.77", "--dst", "203.0.113.10", "--port", "443"])
        .arg("--expect-delivered")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "DNAT 203.0.113.10 -> 10.0.0.10 via VIP web-vip",
        ))
        .stdout(predicate::str::contains("Delivered via port2"));
}

#[test]
fn deny_policy_blocks_and_expectation_fails() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/nat.conf"))
        .args(["--src", "10.0.0.10", "--dst", "8.8.8.8", "--port", "443"])
        .arg("--expect-delivered")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Blocked: denied by policy 30 (block-web-out)",
        ))
        .stderr(predicate::str::contains("trace did not deliver the flow"));
}

#[test]
fn trace_json_reports_status_tag() {
    let output = fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1.50", "--dst", "192.168.1.99", "--port", "80"])
        .args(["--format", "json"])
        .output()
        .expect("run trace");
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(result["status"]["status"], "delivered");
    assert_eq!(result["hops"].as_array().map(Vec::len), Some(1));
}

#[test]
fn icmp_trace_needs_no_port() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1.50", "--dst", "192.168.1.99"])
        .args(["--protocol", "icmp", "--icmp", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered via port1"));
}

#[test]
fn tcp_without_port_is_rejected() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1.50", "--dst", "192.168.1.99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn invalid_address_is_rejected() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1", "--dst", "192.168.1.99", "--port", "80"])
        .assert()
        .failure();
}

#[test]
fn zero_hop_budget_is_rejected() {
    fortitrace()
        .arg("trace")
        .arg(fixture("fixtures/basic.conf"))
        .args(["--src", "192.168.1.50", "--dst", "192.168.1.99", "--port", "80"])
        .args(["--max-hops", "0"])
        .assert()
        .failure();
}
