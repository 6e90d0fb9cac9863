//! Runs the `pash` binary the way a user would.

use std::process::Command;

fn pash() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pash"))
}

#[test]
fn command_string_prints_values() {
    let output = pash()
        .args(["-c", "1..3 | ForEach-Object { $_ * 2 }"])
        .output()
        .expect("failed to run pash");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n4\n6\n");
}

#[test]
fn errors_go_to_stderr_and_fail_the_run() {
    let output = pash()
        .args(["-c", "'ok'; 1 / 0"])
        .output()
        .expect("failed to run pash");
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("DivideByZero"));
}

#[test]
fn json_flag_prints_the_whole_result() {
    let output = pash()
        .args(["--json", "-c", "'red' * 3"])
        .output()
        .expect("failed to run pash");
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["state"], "Completed");
    assert_eq!(parsed["output"][0], "redredred");
}

#[test]
fn script_files_skip_the_shebang() {
    let path = std::env::temp_dir().join(format!("pash-script-{}.ps1", std::process::id()));
    std::fs::write(
        &path,
        "#!/usr/bin/env pash\nfunction Square($n) { $n * $n }\n1..3 | ForEach-Object { Square $_ }\n",
    )
    .expect("write script");

    let output = pash().arg(&path).output().expect("failed to run pash");
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n4\n9\n");
}

#[test]
fn version_flag() {
    let output = pash().arg("--version").output().expect("failed to run pash");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("pash "));
}
