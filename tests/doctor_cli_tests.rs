mod common;

use common::TestEnv;

#[test]
fn doctor_subcommand_is_available() {
    let output = TestEnv::new().run(&["doctor", "--help"]);

    assert!(
        output.status.success(),
        "doctor --help should succeed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn doctor_reports_missing_tools_and_key() {
    let env = TestEnv::new();
    env.write_config(
        r#"
[encoder]
ffmpeg_path = "/nonexistent/ffmpeg"
ffprobe_path = "/nonexistent/ffprobe"
"#,
    );

    let output = env.run(&["doctor", "--json"]);
    assert!(
        output.status.success(),
        "doctor should run successfully\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("doctor --json prints JSON");
    let status = |name: &str| {
        report["checks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == name)
            .map(|c| c["status"].as_str().unwrap().to_string())
            .unwrap()
    };

    assert_eq!(status("ffmpeg"), "missing");
    assert_eq!(status("ffprobe"), "missing");
    assert_eq!(status("codec"), "unknown");
    assert_eq!(status("api-key"), "missing");
    assert_eq!(report["provider"], "groq");
}

#[cfg(unix)]
#[test]
fn doctor_passes_with_working_tools() {
    let tools = common::FakeMediaTools::install(&common::FakeTools::default());
    let env = TestEnv::new();
    env.write_config(&format!(
        "[encoder]\nffmpeg_path = {:?}\nffprobe_path = {:?}\n",
        tools.ffmpeg().display().to_string(),
        tools.ffprobe().display().to_string()
    ));

    let output = env.run_with_env(&["doctor"], &[("GROQ_API_KEY", "gsk_test")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("All checks passed."), "stdout:\n{}", stdout);
}
