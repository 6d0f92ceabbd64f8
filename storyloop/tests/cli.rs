//! CLI tests: spawn the storyloop binary and check exit codes.

use std::fs;
use std::process::Command;

use storyloop::exit_codes;

#[test]
fn help_exits_ok() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyloop"))
        .arg("--help")
        .output()
        .expect("storyloop --help");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--max-iterations"));
    assert!(stdout.contains("--yolo"));
}

#[test]
fn missing_agent_cli_fails_preflight() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join(".storyloop.toml"),
        "agent_binary = \"storyloop-no-such-agent\"\n",
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_storyloop"))
        .current_dir(temp.path())
        .arg("--yolo")
        .output()
        .expect("storyloop");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("storyloop-no-such-agent"));
}

#[cfg(unix)]
#[test]
fn directory_without_bmad_fails_preflight() {
    let temp = tempfile::tempdir().expect("tempdir");
    // `true --version` succeeds, so only the project check can fail.
    fs::write(temp.path().join(".storyloop.toml"), "agent_binary = \"true\"\n")
        .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_storyloop"))
        .current_dir(temp.path())
        .output()
        .expect("storyloop");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a BMAD project"));
    assert!(!temp.path().join("_bmad-output").exists());
}

#[test]
fn invalid_config_fails_preflight() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(".storyloop.toml"), "max_iterations = 0\n").expect("write config");

    let status = Command::new(env!("CARGO_BIN_EXE_storyloop"))
        .current_dir(temp.path())
        .status()
        .expect("storyloop");

    assert_eq!(status.code(), Some(exit_codes::FAILURE));
}
