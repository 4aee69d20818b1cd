use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const APP_YAML: &str = r#"
name: deploy
arguments:
  - name: verbose
    short: v
    value_type: bool
    inherited: true
subcommands:
  - name: pushImage
    description: Push an image to the registry
    arguments:
      - name: registryUrl
        value_type: string
        env: DEPLOY_REGISTRY
        setting: registry.url
        default: registry.local
      - name: retries
        value_type: integer
        validators:
          - range:
              min: 0
              max: 5
      - name: image
        kind: operand
        value_type: string
        arity: single
  - name: status
"#;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("failed to write fixture");
    path
}

fn cmdpipe() -> Command {
    let mut cmd = Command::cargo_bin("cmdpipe").expect("binary should build");
    cmd.env_remove("DEPLOY_REGISTRY");
    cmd
}

fn run_app(app: &Path) -> Command {
    let mut cmd = cmdpipe();
    cmd.arg("run").arg("--app").arg(app);
    cmd
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_prints_bound_values_as_json() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);

    let output = run_app(&app)
        .args(["--", "pushImage", "-v", "--retries", "3", "web:1.2"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["command"], "pushImage");
    assert_eq!(json["values"]["verbose"], true);
    assert_eq!(json["values"]["retries"], 3);
    assert_eq!(json["values"]["image"], "web:1.2");
    assert_eq!(json["values"]["registryUrl"], "registry.local");
}

#[test]
fn run_accepts_inherited_option_before_subcommand() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);

    let output = run_app(&app)
        .args(["--", "-v", "pushImage", "web"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["command"], "pushImage");
    assert_eq!(json["values"]["verbose"], true);
}

#[test]
fn run_applies_name_case_from_config() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);
    let config = write_file(&dir, "runner.yaml", "name_case: kebab\n");

    run_app(&app)
        .arg("--config")
        .arg(&config)
        .args(["--", "push-image", "--registry-url", "example.org", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""command": "push-image""#))
        .stdout(predicate::str::contains(r#""registry-url": "example.org""#));
}

#[test]
fn run_reads_environment_then_settings() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);
    let settings = write_file(&dir, "settings.yaml", "registry.url: from-settings\n");

    run_app(&app)
        .arg("--settings")
        .arg(&settings)
        .args(["--", "pushImage", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-settings"));

    run_app(&app)
        .env("DEPLOY_REGISTRY", "from-env")
        .arg("--settings")
        .arg(&settings)
        .args(["--", "pushImage", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-env"));
}

#[test]
fn run_reports_errors_with_exit_codes() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);

    run_app(&app)
        .args(["--", "stauts"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Did you mean 'status'?"));

    run_app(&app)
        .args(["--", "pushImage", "--retries", "lots"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'lots' is not a valid NUMBER"))
        .stderr(predicate::str::contains("'<image>' is required"));

    run_app(&app)
        .args(["--", "pushImage", "--retries", "9"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("'--retries' must be between 0 and 5"))
        .stderr(predicate::str::contains("'<image>' is required"));
}

#[test]
fn run_shows_help_for_resolved_command() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);

    run_app(&app)
        .args(["--", "pushImage", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Usage: deploy pushImage [options] <image>"))
        .stdout(predicate::str::contains("--retries <NUMBER>"))
        .stdout(predicate::str::contains("[env: DEPLOY_REGISTRY]"));
}

#[test]
fn run_accepts_json_declarations_and_directives() {
    let dir = TempDir::new().unwrap();
    let json = serde_json::json!({
        "name": "calc",
        "arguments": [{ "name": "ratio", "value_type": "float" }]
    });
    let app = write_file(&dir, "app.json", &json.to_string());

    run_app(&app)
        .args(["--", "[culture:de-DE]", "[parse]", "--ratio", "0,5"])
        .assert()
        .success()
        .stdout("command: calc\n  --ratio = 0.5 [command line]\n");

    run_app(&app)
        .args(["--", "[suggest:--r]"])
        .assert()
        .success()
        .stdout("--ratio\n");
}

// ---------------------------------------------------------------------------
// validate / tree
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_good_declaration() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);

    cmdpipe()
        .arg("validate")
        .arg("--app")
        .arg(&app)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid: 3 command(s)"));
}

#[test]
fn validate_lists_problems() {
    let dir = TempDir::new().unwrap();
    let app = write_file(
        &dir,
        "bad.yaml",
        r#"
name: bad
subcommands:
  - name: run
  - name: run
arguments:
  - name: help
"#,
    );

    cmdpipe()
        .arg("validate")
        .arg("--app")
        .arg(&app)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("help"))
        .stderr(predicate::str::contains("2 problem(s) found"));
}

#[test]
fn tree_prints_transformed_names() {
    let dir = TempDir::new().unwrap();
    let app = write_file(&dir, "app.yaml", APP_YAML);
    let config = write_file(&dir, "runner.yaml", "name_case: snake\n");

    cmdpipe()
        .arg("tree")
        .arg("--app")
        .arg(&app)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("deploy\n    --verbose (inherited)\n"))
        .stdout(predicate::str::contains("  push_image\n      --registry_url\n"))
        .stdout(predicate::str::contains("      <image>\n"));
}

#[test]
fn missing_declaration_file_fails() {
    cmdpipe()
        .args(["tree", "--app", "/nonexistent/app.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read"));
}

// ---------------------------------------------------------------------------
// register-completion
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn register_completion_reports_tool_outcome() {
    cmdpipe()
        .args([
            "register-completion",
            "--tool",
            "true",
            "--command-path",
            "/usr/bin/deploy",
            "--suggestion-command",
            "deploy",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 'deploy'"));

    cmdpipe()
        .args([
            "register-completion",
            "--tool",
            "false",
            "--command-path",
            "/usr/bin/deploy",
            "--suggestion-command",
            "deploy",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed"));
}
