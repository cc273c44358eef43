use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_racetrack_env"))
        .args(args)
        .env("RUST_LOG", "warn,racetrack_env=info")
        .output()
        .expect("Failed to execute racetrack_env")
}

/// Test that the environment runs headless without crashing
#[test]
fn test_headless_run_completes() {
    let output = run(&["--episodes", "2", "--steps", "50", "--seed", "7"]);

    assert!(
        output.status.success(),
        "Run failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("=== RUN COMPLETE ==="),
        "Run did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Episodes: 2"), "stderr: {}", stderr);
    assert!(stderr.contains("Stub observation: 160x120"), "stderr: {}", stderr);
}

/// Test that per-step trace lines are logged
#[test]
fn test_trace_lines_logged() {
    let output = run(&["--episodes", "1", "--steps", "10", "--waypoints", "24"]);
    assert!(output.status.success(), "Run failed");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Track: 25 waypoints"), "stderr: {}", stderr);
    assert!(stderr.contains("SIM_TRACE_LOG:"), "Missing trace lines");
    assert!(stderr.contains("Spawned 3 bot cars"), "Missing bot fleet");
}

/// Test that a configuration file drives the run
#[test]
fn test_config_file_run() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = dir.path().join("metrics.json");
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        serde_json::json!({
            "world_name": "circle",
            "job_type": "EVALUATION",
            "job_id": "eval-7",
            "metrics_path": metrics,
            "discrete_action_space": true,
            "bot_cars": []
        })
        .to_string(),
    )
    .unwrap();

    let output = run(&[
        "--config",
        config.to_str().unwrap(),
        "--episodes",
        "1",
        "--steps",
        "20",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {}", stderr);
    assert!(stderr.contains("Spawned 0 bot cars"), "stderr: {}", stderr);
    assert!(stderr.contains("=== RUN COMPLETE ==="), "stderr: {}", stderr);
}

/// Test that a bad configuration file is reported as a structured error
#[test]
fn test_bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"world_name": "circle"}"#).unwrap();

    let output = run(&["--config", config.to_str().unwrap()]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"error_code\":\"500\""), "stderr: {}", stderr);
}
