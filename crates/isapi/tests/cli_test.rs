//! Integration tests for the `isapi` CLI binary.
//!
//! Argument parsing and config errors run without a device; the rest run
//! the binary against a wiremock server standing in for one.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `isapi` binary with env isolation.
///
/// Clears all `ISAPI_*` env vars and points config directories at an empty
/// temp dir so tests never touch the user's real configuration.
fn isapi_cmd(home: &tempfile::TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("isapi");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("ISAPI_PROFILE")
        .env_remove("ISAPI_HOST")
        .env_remove("ISAPI_USERNAME")
        .env_remove("ISAPI_PASSWORD")
        .env_remove("ISAPI_TIMEOUT")
        .env_remove("ISAPI_INSECURE")
        .env_remove("ISAPI_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// `isapi_cmd` with connection flags for `server` already set.
fn device_cmd(home: &tempfile::TempDir, server: &MockServer) -> assert_cmd::Command {
    let uri = server.uri();
    let mut cmd = isapi_cmd(home);
    cmd.args([
        "--host",
        uri.as_str(),
        "--username",
        "admin",
        "--password",
        "12345",
    ]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn device() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<DeviceStatus><currentDeviceTime>2024-06-15T10:30:00</currentDeviceTime>\
             <deviceUpTime>86400</deviceUpTime></DeviceStatus>",
        ))
        .mount(&server)
        .await;
    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = isapi_cmd(&home).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    isapi_cmd(&home).arg("--help").assert().success().stdout(
        predicate::str::contains("status")
            .and(predicate::str::contains("events"))
            .and(predicate::str::contains("download"))
            .and(predicate::str::contains("probe")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    isapi_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("isapi"));
}

#[test]
fn test_malformed_query_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    isapi_cmd(&home)
        .args(["get", "System", "status", "--query", "novalue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_path_prints_toml_location() {
    let home = tempfile::tempdir().unwrap();
    isapi_cmd(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_no_device_configured() {
    let home = tempfile::tempdir().unwrap();
    let output = isapi_cmd(&home).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("No device configured"), "got:\n{text}");
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    let output = isapi_cmd(&home)
        .args(["--profile", "garage", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("garage"), "got:\n{text}");
}

// ── Device commands ─────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_status_prints_json() {
    let server = device().await;
    let home = tempfile::tempdir().unwrap();

    device_cmd(&home, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"DeviceStatus\"")
                .and(predicate::str::contains("\"deviceUpTime\": \"86400\"")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_text_prints_raw_body() {
    let server = device().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<DeviceInfo/>"))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    device_cmd(&home, &server)
        .args(["get", "System", "deviceInfo", "--text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<DeviceInfo/>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_missing_endpoint_exits_not_found() {
    let server = device().await;
    let home = tempfile::tempdir().unwrap();

    device_cmd(&home, &server)
        .args(["get", "System", "nothingHere"])
        .assert()
        .code(4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_events_respects_count() {
    let server = device().await;
    let part = |kind: &str| {
        format!(
            "--boundary\r\nContent-Type: application/xml\r\n\r\n\
             <EventNotificationAlert><eventType>{kind}</eventType></EventNotificationAlert>\r\n"
        )
    };
    let body = format!("{}{}{}", part("VMD"), part("IO"), part("tamper"));
    Mock::given(method("GET"))
        .and(path("/ISAPI/Event/notification/alertStream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "multipart/mixed; boundary=boundary"),
        )
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = device_cmd(&home, &server)
        .args(["--output", "json-compact", "events", "--count", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "got:\n{stdout}");
    assert!(lines[0].contains("VMD"));
    assert!(lines[1].contains("IO"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_writes_file() {
    let server = device().await;
    let jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
    Mock::given(method("GET"))
        .and(path("/ISAPI/Streaming/channels/101/picture"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jpeg.clone(), "image/jpeg"))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("snap.jpg");

    device_cmd(&home, &server)
        .args(["download", "Streaming", "channels", "101", "picture", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved 6 bytes"));

    assert_eq!(std::fs::read(&out).unwrap(), jpeg);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_reports_online() {
    let server = device().await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/time"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<Time><timeMode>NTP</timeMode><localTime>2024-06-15T10:30:00+08:00</localTime></Time>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/Video/inputs/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<VideoInputChannelList>\
             <VideoInputChannel><id>1</id><videoInputEnabled>true</videoInputEnabled></VideoInputChannel>\
             <VideoInputChannel><id>2</id><videoInputEnabled>false</videoInputEnabled></VideoInputChannel>\
             </VideoInputChannelList>",
        ))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = device_cmd(&home, &server).arg("probe").output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "ONLINE");
    assert_eq!(report["authMethod"], "digest");
    assert_eq!(report["deviceInfo"]["dvrTime"], "2024-06-15T10:30:00+08:00");
    assert_eq!(report["cameraInfo"]["totalCameras"], 2);
    assert_eq!(report["cameraInfo"]["cameraStatus"][1]["status"], "Not Working");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_reports_error_on_rejected_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();

    let output = device_cmd(&home, &server).arg("probe").output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "ERROR");
    assert!(report["error"].as_str().unwrap().contains("authentication methods failed"));
    assert_eq!(report["cameraInfo"]["totalCameras"], 0);
}
