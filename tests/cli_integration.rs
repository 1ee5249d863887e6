//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Run sealfile with the given key file and arguments
fn run_sealfile(key_file: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sealfile"))
        .arg("--key-file")
        .arg(key_file)
        .args(args)
        .env_remove("SEALFILE_KEY_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sealfile")
}

/// Run sealfile with a password piped to stdin
fn run_sealfile_with_password(args: &[&str], password: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sealfile"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn sealfile");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        let _ = stdin.write_all(password.as_bytes());
    }

    child.wait_with_output().expect("failed to wait for sealfile")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("key.txt");
    let file = temp_dir.path().join("hello.txt");
    fs::write(&file, "hello world").unwrap();

    let result = run_sealfile(&key_file, &["encrypt", file.to_str().unwrap()]);
    assert!(result.status.success(), "encrypt failed: {}", stderr(&result));
    assert!(key_file.exists());
    assert!(stdout(&result).contains("1 processed, 0 skipped, 0 failed"));
    assert_ne!(fs::read_to_string(&file).unwrap(), "hello world");

    let result = run_sealfile(&key_file, &["status", file.to_str().unwrap()]);
    assert!(result.status.success());
    assert!(stdout(&result).starts_with("encrypted"));

    let result = run_sealfile(&key_file, &["decrypt", file.to_str().unwrap()]);
    assert!(result.status.success(), "decrypt failed: {}", stderr(&result));
    assert_eq!(fs::read_to_string(&file).unwrap(), "hello world");
}

#[test]
fn test_encrypt_directory_skips_encrypted_files() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("key.txt");
    let data = temp_dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("a.txt"), "first").unwrap();
    fs::write(data.join("b.txt"), "second").unwrap();

    let result = run_sealfile(&key_file, &["encrypt", data.join("a.txt").to_str().unwrap()]);
    assert!(result.status.success());

    let result = run_sealfile(&key_file, &["encrypt", data.to_str().unwrap()]);
    assert!(result.status.success(), "encrypt failed: {}", stderr(&result));
    let out = stdout(&result);
    assert!(out.contains("skipped"), "unexpected output: {out}");
    assert!(out.contains("1 processed, 1 skipped, 0 failed"));

    let result = run_sealfile(&key_file, &["decrypt", data.to_str().unwrap()]);
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(data.join("a.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(data.join("b.txt")).unwrap(), "second");
}

#[test]
fn test_decrypt_with_wrong_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_a = temp_dir.path().join("a.key");
    let key_b = temp_dir.path().join("b.key");
    let file = temp_dir.path().join("secret.txt");
    fs::write(&file, "secret").unwrap();

    assert!(run_sealfile(&key_a, &["encrypt", file.to_str().unwrap()]).status.success());
    let sealed = fs::read(&file).unwrap();

    assert!(run_sealfile(&key_b, &["keygen"]).status.success());
    let result = run_sealfile(&key_b, &["decrypt", file.to_str().unwrap()]);

    assert!(!result.status.success());
    assert!(
        stderr(&result).contains("wrong key"),
        "expected authentication error, got: {}",
        stderr(&result)
    );
    assert_eq!(fs::read(&file).unwrap(), sealed);
}

#[test]
fn test_decrypt_without_key_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("missing.key");
    let file = temp_dir.path().join("x.txt");
    fs::write(&file, "x").unwrap();

    let result = run_sealfile(&key_file, &["decrypt", file.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(!key_file.exists());
}

#[test]
fn test_encrypt_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("key.txt");
    let missing = temp_dir.path().join("nonexistent.txt");

    let result = run_sealfile(&key_file, &["encrypt", missing.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(stderr(&result).contains("nonexistent.txt"));
    assert!(!missing.exists());
}

#[test]
fn test_keygen_refuses_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("key.txt");

    assert!(run_sealfile(&key_file, &["keygen"]).status.success());
    let original = fs::read(&key_file).unwrap();
    assert_eq!(original.len(), 32);

    assert!(!run_sealfile(&key_file, &["keygen"]).status.success());
    assert_eq!(fs::read(&key_file).unwrap(), original);

    assert!(run_sealfile(&key_file, &["keygen", "--force"]).status.success());
    assert_ne!(fs::read(&key_file).unwrap(), original);
}

#[test]
fn test_hash_matches_known_digest() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("hello.txt");
    fs::write(&file, "hello world").unwrap();

    let result = run_sealfile(&temp_dir.path().join("key.txt"), &["hash", file.to_str().unwrap()]);
    assert!(result.status.success());
    assert!(
        stdout(&result)
            .starts_with("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    );
}

#[test]
fn test_derive_key_is_reproducible() {
    let temp_dir = TempDir::new().unwrap();
    let salt = "000102030405060708090a0b0c0d0e0f";
    let first = temp_dir.path().join("first.key");
    let second = temp_dir.path().join("second.key");

    for output in [&first, &second] {
        let result = run_sealfile_with_password(
            &[
                "derive-key",
                "--password-stdin",
                "--salt",
                salt,
                "--output",
                output.to_str().unwrap(),
            ],
            "correct horse\n",
        );
        assert!(result.status.success(), "derive-key failed: {}", stderr(&result));
        assert!(stdout(&result).contains(&format!("salt: {salt}")));
    }

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    assert_eq!(fs::read(&first).unwrap().len(), 32);
}

#[test]
fn test_derive_key_ignores_trailing_newline() {
    let temp_dir = TempDir::new().unwrap();
    let salt = "0f0e0d0c0b0a09080706050403020100";
    let piped = temp_dir.path().join("piped.key");
    let bare = temp_dir.path().join("bare.key");

    for (output, password) in [(&piped, "hunter2\n"), (&bare, "hunter2")] {
        let result = run_sealfile_with_password(
            &[
                "derive-key",
                "--password-stdin",
                "--salt",
                salt,
                "--output",
                output.to_str().unwrap(),
            ],
            password,
        );
        assert!(result.status.success(), "derive-key failed: {}", stderr(&result));
    }

    assert_eq!(fs::read(&piped).unwrap(), fs::read(&bare).unwrap());
}
