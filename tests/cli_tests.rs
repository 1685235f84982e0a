//! CLI integration tests
//!
//! These tests run the binary through cargo and only exercise commands that
//! need no network access.

use std::process::Command;

const CLI_BINARY: &str = "market-search";

/// Run the CLI with a clean provider environment and capture its output
fn run_cli_command(args: &[&str]) -> (String, String, bool) {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--bin", CLI_BINARY, "--"])
        .args(args)
        .env_remove("EXA_API_KEY")
        .env_remove("GOOGLE_SEARCH_KEY")
        .env_remove("GOOGLE_CSE_ID")
        .env_remove("SERPER_API_KEY")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    (stdout, stderr, success)
}

#[test]
fn test_cli_help() {
    let (stdout, _stderr, success) = run_cli_command(&["--help"]);

    assert!(success, "Help command should succeed");
    assert!(stdout.contains("Multi-provider market research search CLI"));
    for command in ["search", "distinct", "single", "filter", "providers"] {
        assert!(stdout.contains(command), "Help should list '{command}'");
    }
}

#[test]
fn test_cli_version() {
    let (stdout, _stderr, success) = run_cli_command(&["--version"]);

    assert!(success, "Version command should succeed");
    assert!(stdout.contains("market-search"));
}

#[test]
fn test_single_search_help() {
    let (stdout, _stderr, success) = run_cli_command(&["single", "--help"]);

    assert!(success, "Single search help should succeed");
    assert!(stdout.contains("Search using a single provider"));
    assert!(stdout.contains("--provider"));
    assert!(stdout.contains("--max-results"));
    for format in ["table", "json", "simple"] {
        assert!(stdout.contains(format), "Format {format} should be in help");
    }
}

#[test]
fn test_distinct_search_help() {
    let (stdout, _stderr, success) = run_cli_command(&["distinct", "--help"]);

    assert!(success);
    assert!(stdout.contains("--segment"));
    assert!(stdout.contains("--audience"));
}

#[test]
fn test_invalid_provider() {
    let (stdout, stderr, success) =
        run_cli_command(&["single", "test query", "--provider", "invalid"]);

    assert!(!success, "Invalid provider should fail");
    assert!(stderr.contains("invalid") || stdout.contains("invalid"));
}

#[test]
fn test_unconfigured_provider_fails() {
    let (stdout, stderr, success) = run_cli_command(&[
        "single",
        "fintech",
        "--provider",
        "serper",
        "--max-results",
        "1",
    ]);

    assert!(!success, "Serper without an API key should fail");
    let output = format!("{stdout}{stderr}");
    assert!(output.contains("not configured"));
}

#[test]
fn test_providers_command() {
    let (stdout, _stderr, success) = run_cli_command(&["providers"]);

    assert!(success, "Providers command should succeed");
    assert!(stdout.contains("Search Providers"));
    for name in ["exa", "google", "serper", "bing"] {
        assert!(stdout.contains(name), "Providers output should list '{name}'");
    }
    assert!(stdout.contains("✅"), "Bing needs no key and stays enabled");
    assert!(stdout.contains("❌"), "Providers without keys are disabled");
    assert!(stdout.contains("SERPER_API_KEY"));
}

#[test]
fn test_filter_command_rejects_blocked_domain() {
    let (stdout, _stderr, success) = run_cli_command(&[
        "filter",
        "https://www.facebook.com/somepage",
        "--format",
        "json",
    ]);

    assert!(success);
    assert!(stdout.contains("\"approved\": false"));
    assert!(stdout.contains("\"domain_blocked\""));
}

#[test]
fn test_filter_command_approves_preferential_domain() {
    let (stdout, _stderr, success) = run_cli_command(&[
        "filter",
        "https://exame.com/negocios/mercado-fintech",
        "--title",
        "Análise do mercado de fintechs",
    ]);

    assert!(success);
    assert!(stdout.contains("APPROVED"));
    assert!(stdout.contains("Preferential"));
}

#[test]
fn test_empty_query_handling() {
    let (stdout, stderr, success) = run_cli_command(&["search", "   "]);

    assert!(!success, "Blank query should be rejected");
    let output = format!("{stdout}{stderr}").to_lowercase();
    assert!(output.contains("query cannot be empty"));
}
