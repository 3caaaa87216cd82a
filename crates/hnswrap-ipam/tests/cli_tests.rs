//! Tests for the hnswrap-ipam binary.

mod common;

use assert_cmd::Command;
use common::{Behavior, spawn_cns};
use predicates::prelude::*;

fn plugin(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hnswrap-ipam").unwrap();
    cmd.env_clear()
        .env("HNSWRAP_CONFIG", config)
        .env("RUST_LOG", "off")
        .env("CNI_CONTAINERID", "0123456789abcdef")
        .env("CNI_NETNS", "/var/run/netns/cni-1")
        .env("CNI_IFNAME", "eth0")
        .env("CNI_PATH", "/opt/cni/bin");
    cmd
}

#[test]
fn version_command() {
    let dir = tempfile::tempdir().unwrap();
    plugin(&dir.path().join("absent.toml"))
        .env("CNI_COMMAND", "VERSION")
        .write_stdin(r#"{"cniVersion":"0.3.1"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""cniVersion":"0.3.1""#))
        .stdout(predicate::str::contains("supportedVersions"));
}

#[test]
fn missing_pod_args_prints_cni_error() {
    let dir = tempfile::tempdir().unwrap();
    plugin(&dir.path().join("absent.toml"))
        .env("CNI_COMMAND", "ADD")
        .env("CNI_ARGS", "IgnoreUnknown=1")
        .write_stdin(r#"{"cniVersion":"1.0.0","name":"azure","type":"hnswrap-ipam"}"#)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""code":4"#))
        .stdout(predicate::str::contains("K8S_POD_NAME"));
}

#[test]
fn unknown_command_prints_cni_error() {
    let dir = tempfile::tempdir().unwrap();
    plugin(&dir.path().join("absent.toml"))
        .env("CNI_COMMAND", "GC")
        .write_stdin(r#"{"cniVersion":"1.1.0","name":"azure","type":"hnswrap-ipam"}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""cniVersion":"1.1.0""#))
        .stdout(predicate::str::contains(r#""code":4"#))
        .stdout(predicate::str::contains("GC"));
}

#[test]
fn missing_command_prints_cni_error() {
    let dir = tempfile::tempdir().unwrap();
    plugin(&dir.path().join("absent.toml"))
        .write_stdin(r#"{"cniVersion":"1.0.0","name":"azure","type":"hnswrap-ipam"}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""code":4"#));
}

#[tokio::test(flavor = "multi_thread")]
async fn add_against_cns() {
    let cns = spawn_cns(Behavior::Allocate).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("hnswrap.toml");
    std::fs::write(&config, format!("[cns]\nbase_url = \"{}\"\n", cns.url())).unwrap();

    let output = tokio::task::spawn_blocking(move || {
        plugin(&config)
            .env("CNI_COMMAND", "ADD")
            .env("CNI_ARGS", "K8S_POD_NAMESPACE=default;K8S_POD_NAME=web-0")
            .write_stdin(r#"{"cniVersion":"1.0.0","name":"azure","type":"hnswrap-ipam"}"#)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stdout: {}", String::from_utf8_lossy(&output.stdout));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["ips"][0]["address"], "10.240.0.7/16");
    assert_eq!(cns.requests().len(), 1);
}
