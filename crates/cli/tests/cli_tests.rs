//! CLI integration tests

use std::process::{Command, Output};

/// Run gwctl with an isolated home directory so no user config is read
fn gwctl(args: &[&str], gateway_url: Option<&str>) -> Output {
    let home = tempfile::tempdir().expect("Failed to create temp home");
    let mut command = Command::new(env!("CARGO_BIN_EXE_gwctl"));
    command.args(args).env("HOME", home.path());
    match gateway_url {
        Some(url) => command.env("GWCTL_GATEWAY_URL", url),
        None => command.env_remove("GWCTL_GATEWAY_URL"),
    };
    command.output().expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = gwctl(&["--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("management gateway"),
        "Should show app description"
    );
    for command in ["containers", "deployments", "services", "metrics", "alerts"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = gwctl(&["--version"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("gwctl"), "Should show binary name");
}

#[test]
fn test_containers_help_lists_subcommands() {
    let output = gwctl(&["containers", "--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for command in ["list", "get", "logs", "stats", "start", "stop", "rm"] {
        assert!(stdout.contains(command), "Should show {command} subcommand");
    }
}

#[test]
fn test_rm_help() {
    let output = gwctl(&["containers", "rm", "--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--force"), "Should show force option");
}

#[test]
fn test_logs_help() {
    let output = gwctl(&["containers", "logs", "--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--tail"), "Should show tail option");
}

#[test]
fn test_deployments_scale_requires_replicas() {
    let output = gwctl(&["deployments", "scale", "web"], None);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("--replicas"), "Should name the missing option");
}

#[test]
fn test_deployments_scale_help() {
    let output = gwctl(&["deployments", "scale", "--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(stdout.contains("--replicas"), "Should show replicas option");
}

#[test]
fn test_metrics_container_help() {
    let output = gwctl(&["metrics", "container", "--help"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--duration"), "Should show duration option");
}

#[test]
fn test_invalid_format_rejected() {
    let output = gwctl(&["--format", "yaml", "alerts"], None);
    assert!(!output.status.success(), "Unknown format should fail");
}

#[test]
fn test_containers_list_json_against_gateway() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/v1/containers")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":"abc123","name":"web","image":"nginx:latest","status":"running",
                 "ports":{},"createdAt":"2024-01-01T00:00:00Z"}]"#,
        )
        .create();

    let output = gwctl(&["--format", "json", "containers", "list"], Some(&server.url()));
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let containers: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(containers[0]["name"], "web");
}

#[test]
fn test_gateway_error_exits_nonzero() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/v1/containers/nope/start")
        .with_status(404)
        .with_body(r#"{"error":"container nope not found","kind":"not_found"}"#)
        .create();

    let output = gwctl(&["containers", "start", "nope"], Some(&server.url()));
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("container nope not found"));
}

#[test]
fn test_unreachable_gateway_exits_nonzero() {
    let output = gwctl(&["alerts"], Some("http://127.0.0.1:1"));
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to send request"));
}
