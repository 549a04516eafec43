#![cfg(feature = "cli")]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_oxipatch").to_string()
}

fn run(args: &[&str]) -> Output {
    Command::new(bin()).args(args).output().unwrap()
}

fn p(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Write a source/target pair and encode it, returning the paths.
fn make_patch(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
    let source = dir.join("source.bin");
    let target = dir.join("target.bin");
    let delta = dir.join("patch.oxp");
    std::fs::write(&source, b"abcde12345abcde12345abcde12345abcde12345").unwrap();
    std::fs::write(&target, b"abcdeXXXXXabcde12345abcde12345abcde12345!").unwrap();

    let out = run(&["encode", "-s", p(&source), p(&target), p(&delta)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    (source, target, delta)
}

#[test]
fn cli_encode_decode_roundtrip() {
    let dir = tempdir().unwrap();
    let (source, target, delta) = make_patch(dir.path());
    let output = dir.path().join("output.bin");

    let out = run(&["decode", "--source", p(&source), p(&delta), p(&output)]);
    assert!(out.status.success());
    assert_eq!(
        std::fs::read(&output).unwrap(),
        std::fs::read(&target).unwrap()
    );
}

#[test]
fn cli_stdin_stdout_roundtrip() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.bin");
    std::fs::write(&source, b"hello hello hello hello hello").unwrap();
    let target = b"hello hello HELLO hello hello!".to_vec();

    let mut child = Command::new(bin())
        .args(["encode", "-s", p(&source)])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(&target).unwrap();
    let encoded = child.wait_with_output().unwrap();
    assert!(encoded.status.success());

    let mut child = Command::new(bin())
        .args(["decode", "-s", p(&source)])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(&encoded.stdout).unwrap();
    let decoded = child.wait_with_output().unwrap();
    assert!(decoded.status.success());
    assert_eq!(decoded.stdout, target);
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let (source, _target, delta) = make_patch(dir.path());
    let output = dir.path().join("existing.bin");
    std::fs::write(&output, b"keep me").unwrap();

    let out = run(&["decode", "-s", p(&source), p(&delta), p(&output)]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let out = run(&["-f", "decode", "-s", p(&source), p(&delta), p(&output)]);
    assert!(out.status.success());
    assert_ne!(std::fs::read(&output).unwrap(), b"keep me");
}

#[test]
fn cli_checksum_failure_exit_code() {
    let dir = tempdir().unwrap();
    let (source, _target, delta) = make_patch(dir.path());
    let mut bytes = std::fs::read(&delta).unwrap();
    let last_payload = bytes.len() - 2;
    bytes[last_payload] ^= 0x01;
    std::fs::write(&delta, &bytes).unwrap();

    let output = dir.path().join("output.bin");
    let out = run(&["decode", "-s", p(&source), p(&delta), p(&output)]);
    assert_eq!(out.status.code(), Some(5));
    assert!(!output.exists());
}

#[test]
fn cli_truncated_patch_exit_code() {
    let dir = tempdir().unwrap();
    let (source, _target, delta) = make_patch(dir.path());
    let bytes = std::fs::read(&delta).unwrap();
    std::fs::write(&delta, &bytes[..bytes.len() - 1]).unwrap();

    // Nothing reaches stdout when decoding fails.
    let out = run(&["decode", "-s", p(&source), p(&delta)]);
    assert_eq!(out.status.code(), Some(4));
    assert!(out.stdout.is_empty());
}

#[test]
fn cli_header_errors_exit_codes() {
    let dir = tempdir().unwrap();
    let (source, _target, delta) = make_patch(dir.path());
    let good = std::fs::read(&delta).unwrap();

    let mut bad_magic = good.clone();
    bad_magic[0] = b'X';
    std::fs::write(&delta, &bad_magic).unwrap();
    let out = run(&["decode", "-s", p(&source), "--check-only", p(&delta)]);
    assert_eq!(out.status.code(), Some(4));

    let mut newer = good;
    newer[4] = 9;
    std::fs::write(&delta, &newer).unwrap();
    let out = run(&["decode", "-s", p(&source), "--check-only", p(&delta)]);
    assert_eq!(out.status.code(), Some(6));
}

#[test]
fn cli_missing_input_is_io_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.bin");
    let out = run(&["encode", "-s", p(&missing), p(&missing)]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn cli_usage_error_exit_code() {
    let out = run(&["encode", "--level", "12"]);
    assert_eq!(out.status.code(), Some(2));

    let out = run(&["encode", "--window-size", "1G", "-c"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let (source, target, _delta) = make_patch(dir.path());
    let delta = dir.path().join("second.oxp");

    let out = run(&[
        "--json",
        "encode",
        "-s",
        p(&source),
        "--description",
        "json test",
        p(&target),
        p(&delta),
    ]);
    assert!(out.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(stats["command"], "encode");
    assert_eq!(stats["windows"], 1);
    assert_eq!(stats["input_size"], 41);
    assert_eq!(stats["delta_size"], std::fs::metadata(&delta).unwrap().len());
}

#[test]
fn cli_print_commands() {
    let dir = tempdir().unwrap();
    let (_source, _target, delta) = make_patch(dir.path());

    let out = run(&["header", p(&delta)]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("format version:          1"));
    assert!(text.contains("source length:           40"));
    assert!(text.contains("target length:           41"));
    assert!(text.contains("window number:           0"));

    let out = run(&["delta", p(&delta)]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("COPY") || text.contains("INSERT"));
}

#[test]
fn cli_config_works() {
    let out = run(&["config"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stderr).unwrap();
    assert!(text.contains("HARD_MAX_WINDOW=16777216"));
}
