//! Behavioral specifications for the `jx-agent` binary.
//!
//! Black-box: builds a job description JSON, pipes it to `jx-agent run`
//! with `--fake-controller`, and asserts on exit code, the fake
//! controller's reported result (echoed to stdout), and stderr.

use assert_cmd::Command;
use serde_json::{json, Value};

fn agent_cmd() -> Command {
    Command::cargo_bin("jx-agent").expect("jx-agent binary should build")
}

fn minimal_job(overrides: Value) -> Value {
    let mut job = json!({
        "id": "job-1",
        "command": "echo hello",
        "repository": "https://example.com/repo.git",
        "commit": "HEAD",
        "branch": "main",
        "refspec": null,
        "pull_request": null,
        "pipeline_provider": "github",
        "agent_name": "agent-1",
        "organization_slug": "acme",
        "pipeline_slug": "build",
        "build_path": "/tmp/jx-agent-specs",
        "hooks_path": "/nonexistent-hooks",
        "plugins_path": "/nonexistent-plugins",
        "cancel_signal": "SIGTERM",
        "grace_period": 5,
        "verification_key": null,
        "tracing_backend": null,
        "phases": ["command"]
    });
    merge(&mut job, overrides);
    job
}

fn merge(base: &mut Value, overrides: Value) {
    if let Value::Object(map) = overrides {
        for (key, value) in map {
            base.as_object_mut().unwrap().insert(key, value);
        }
    }
}

fn run_job(job: &Value, build_path: &std::path::Path) -> assert_cmd::assert::Assert {
    let mut cmd = agent_cmd();
    cmd.arg("run").arg("--fake-controller").env("JX_AGENT_BUILD_PATH", build_path).env("JX_AGENT_LOG_DIR", build_path.join("logs"));
    cmd.write_stdin(serde_json::to_vec(job).unwrap());
    cmd.assert()
}

#[test]
fn runs_a_plain_command_successfully() {
    let dir = tempfile::tempdir().unwrap();
    let job = minimal_job(json!({ "id": "job-success" }));

    let assert = run_job(&job, dir.path());
    let output = assert.get_output();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: Value = serde_json::from_str(stdout.trim()).expect("stdout should be the fake controller's report");
    assert_eq!(report["exit_code"], 0);
    assert!(report["signal_reason"].is_null());
}

#[test]
fn missing_signature_under_block_policy_rejects_without_running_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let job = minimal_job(json!({
        "id": "job-signature-blocked",
        "command": "echo should-never-run > /tmp/jx-agent-specs-marker",
        "signing_policy": { "missing_signature": "block", "invalid_signature": "block" },
        "signature": null,
    }));

    let assert = run_job(&job, dir.path());
    let output = assert.get_output();
    // `std::process::exit(-1)` truncates to the low byte on exit, so the
    // OS-visible code is 255, not -1; the fake controller's own report
    // (asserted below) carries the real signed `-1` exit code.
    assert_eq!(output.status.code(), Some(255));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR"), "stderr: {stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: Value = serde_json::from_str(stdout.trim()).expect("stdout should be the fake controller's report");
    assert_eq!(report["exit_code"], -1);
    assert_eq!(report["signal_reason"], "signature-rejected");
}

#[test]
fn artifact_phase_uploads_files_matching_configured_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let job = minimal_job(json!({
        "id": "job-artifacts",
        "command": "echo built > out.txt",
        "phases": ["command", "artifact"],
        "artifact_paths": ["out.txt"],
    }));

    let assert = run_job(&job, dir.path());
    let output = assert.get_output();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: Value = serde_json::from_str(stdout.trim()).expect("stdout should be the fake controller's report");
    assert_eq!(report["exit_code"], 0);
    let artifacts = report["artifacts"].as_array().expect("artifacts should be an array");
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].as_str().unwrap().ends_with("out.txt"));
}

#[test]
fn agent_version_prints_a_version_string() {
    let assert = agent_cmd().arg("version").assert();
    let output = assert.get_output();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("jx-agent"));
}
