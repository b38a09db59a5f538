//! Integration tests for CLI argument handling and exit codes
//!
//! Runs the built binary against a loopback server standing in for the EPI
//! website.

mod common;

use std::fs;
use std::process::{Command, Output};

use common::{epi_reply, MockServer, WORKED_EXAMPLE};
use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_epi-downloader"))
        .args(args)
        .output()
        .expect("Failed to execute epi-downloader")
}

/// Runs the CLI without blocking the runtime that serves the mock server
async fn run_cli_async(args: &[&str]) -> Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_epi-downloader"))
        .args(args)
        .output()
        .await
        .expect("Failed to execute epi-downloader")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("epi-downloader"), "Help should mention epi-downloader");
    assert!(stdout.contains("--dump-config"));
    assert!(stdout.contains("--no-cache"));
}

#[test]
fn test_no_arguments_is_usage_error() {
    let output = run_cli(&[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Should print usage: {}", stderr);
}

#[test]
fn test_dump_config_conflicts_with_download_options() {
    let output = run_cli(&["--dump-config", "--config", "c.json", "--output", "o.csv"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be used with"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_config_requires_output() {
    let output = run_cli(&["--config", "c.json"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unreachable_service_exits_with_failure() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().join("cache");
    let config = temp_dir.path().join("config.json");
    let output_path = temp_dir.path().join("out.csv");
    fs::write(&config, WORKED_EXAMPLE).unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/epi", listener.local_addr().unwrap());
    drop(listener);

    let output = run_cli(&[
        "--config", config.to_str().unwrap(),
        "--output", output_path.to_str().unwrap(),
        "--cache-dir", cache_dir.to_str().unwrap(),
        "--base-url", &base_url,
        "--max-retries", "0",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!output_path.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("metadata"), "Should explain the failure: {}", stderr);
}

#[tokio::test]
async fn test_download_writes_csv_and_exits_successfully() {
    let server = MockServer::start(epi_reply).await;
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().join("cache");
    let config = temp_dir.path().join("config.json");
    let output_path = temp_dir.path().join("out.csv");
    fs::write(&config, WORKED_EXAMPLE).unwrap();

    let output = run_cli_async(&[
        "-c", config.to_str().unwrap(),
        "-o", output_path.to_str().unwrap(),
        "--cache-dir", cache_dir.to_str().unwrap(),
        "--base-url", &server.base_url,
    ])
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let content = fs::read_to_string(&output_path).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert!(content.starts_with("query_model,query_measure,query_year,query_age,query_sex,"));
}

#[tokio::test]
async fn test_partial_failure_still_exits_successfully() {
    let server = MockServer::start(|target: &str| {
        if target.starts_with("/epi/api/model/results/download")
            && common::query_param(target, "sex") == Some("2")
        {
            (404, "missing".to_string())
        } else {
            epi_reply(target)
        }
    })
    .await;
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = temp_dir.path().join("config.json");
    let output_path = temp_dir.path().join("out.csv");
    fs::write(&config, WORKED_EXAMPLE).unwrap();

    let output = run_cli_async(&[
        "-c", config.to_str().unwrap(),
        "-o", output_path.to_str().unwrap(),
        "--cache-dir", temp_dir.path().join("cache").to_str().unwrap(),
        "--base-url", &server.base_url,
    ])
    .await;

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2/4"), "Should summarise failures: {}", stderr);
    assert_eq!(fs::read_to_string(&output_path).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn test_invalid_config_value_exits_with_failure() {
    let server = MockServer::start(epi_reply).await;
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = temp_dir.path().join("config.json");
    let output_path = temp_dir.path().join("out.csv");
    fs::write(&config, r#"{"sex": ["Unknown"]}"#).unwrap();

    let output = run_cli_async(&[
        "-c", config.to_str().unwrap(),
        "-o", output_path.to_str().unwrap(),
        "--cache-dir", temp_dir.path().join("cache").to_str().unwrap(),
        "--base-url", &server.base_url,
    ])
    .await;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown"));
    assert_eq!(server.count("/epi/api/model"), 0);
}

#[tokio::test]
async fn test_dump_config_writes_files_into_dump_dir() {
    let server = MockServer::start(epi_reply).await;
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dump_dir = temp_dir.path().join("refs");

    let output = run_cli_async(&[
        "--dump-config",
        "--dump-dir", dump_dir.to_str().unwrap(),
        "--cache-dir", temp_dir.path().join("cache").to_str().unwrap(),
        "--base-url", &server.base_url,
    ])
    .await;

    assert!(output.status.success());
    assert!(dump_dir.join("metadata.json").exists());
    assert!(dump_dir.join("example_config.json").exists());
}
