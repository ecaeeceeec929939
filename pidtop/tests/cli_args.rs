//! CLI surface tests for the pidtop binary: exit codes and messages, with
//! the registry pointed at a temp dir so no real agents are involved.

use std::process::Command;

fn pidtop() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pidtop"));
    // Keep every invocation away from the user's real registry.
    let dir = tempfile::tempdir().unwrap();
    cmd.env("PIDTOP_CONFIG_DIR", dir.path());
    // Leak the tempdir so it outlives the child process.
    std::mem::forget(dir);
    cmd
}

#[test]
fn help_exits_zero_and_mentions_flags() {
    let out = pidtop().arg("--help").output().expect("run pidtop --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout).to_string();
    assert!(text.contains("--interval") && text.contains("-i"), "{text}");
    assert!(text.contains("--list") && text.contains("--debug"), "{text}");
    assert!(text.contains("pid|host:port"), "{text}");
}

#[test]
fn version_exits_zero() {
    let out = pidtop().arg("--version").output().expect("run pidtop -v");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("pidtop"));
}

#[test]
fn unknown_flag_exits_nonzero() {
    let out = pidtop().arg("--nope").output().expect("run pidtop");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn interval_below_minimum_exits_nonzero() {
    let out = pidtop()
        .args(["--interval", "0", "127.0.0.1:1"])
        .output()
        .expect("run pidtop");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--interval"));
}

#[test]
fn no_target_and_no_agents_exits_nonzero() {
    let out = pidtop().output().expect("run pidtop");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no running agents"));
}

#[test]
fn unknown_pid_target_exits_nonzero() {
    let out = pidtop().arg("999999999").output().expect("run pidtop");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn list_with_empty_registry_exits_zero() {
    let out = pidtop().arg("--list").output().expect("run pidtop -l");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("no running agents"));
}
