#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn swea(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("swea").unwrap();
    cmd.current_dir(dir.path())
        .env("SWEA_ROOT", dir.path())
        .env_remove("SWEA_SERVER");
    cmd
}

// ---------------------------------------------------------------------------
// Offline behaviour
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    swea(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("settings"));
}

#[test]
fn client_command_without_server_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    swea(&dir)
        .args(["--server", "http://127.0.0.1:1", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"))
        .stderr(predicate::str::contains("cannot reach swea server"));
}

#[test]
fn settings_set_rejects_invalid_json_before_connecting() {
    let dir = TempDir::new().unwrap();
    swea(&dir)
        .args(["--server", "http://127.0.0.1:1", "settings", "set", "{nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings must be valid JSON"));
}

#[test]
fn settings_set_accepts_global_json_flag() {
    let dir = TempDir::new().unwrap();
    swea(&dir)
        .args(["--server", "http://127.0.0.1:1", "--json", "settings", "set", "{\"a\": 1}"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot reach swea server"));
}

#[test]
fn chat_requires_project() {
    let dir = TempDir::new().unwrap();
    swea(&dir)
        .args(["chat", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--project"));
}

// ---------------------------------------------------------------------------
// Against a running server
// ---------------------------------------------------------------------------

/// Kills the server process when the test ends, pass or fail.
struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start_server(dir: &TempDir) -> (ServerGuard, String) {
    let port = free_port();
    let child = std::process::Command::new(assert_cmd::cargo::cargo_bin("swea"))
        .args(["serve", "--host", "127.0.0.1", "--port", &port.to_string()])
        .env("SWEA_ROOT", dir.path())
        .env_remove("OPENROUTER_API_KEY")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let guard = ServerGuard(child);
    let url = format!("http://127.0.0.1:{port}");

    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let ok = swea(dir)
            .args(["--server", &url, "status"])
            .output()
            .unwrap()
            .status
            .success();
        if ok {
            break;
        }
        assert!(Instant::now() < deadline, "server did not start on {url}");
        std::thread::sleep(Duration::from_millis(100));
    }
    (guard, url)
}

#[test]
fn end_to_end_chat_without_api_key_records_error_reply() {
    let dir = TempDir::new().unwrap();
    let (_server, url) = start_server(&dir);

    swea(&dir)
        .args(["--server", &url, "new", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));

    swea(&dir)
        .args(["--server", &url, "projects", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"demo\""));

    // No provider key: the run degrades to the error reply instead of failing.
    swea(&dir)
        .args(["--server", &url, "chat", "--project", "demo", "hello", "there"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[AI Error] Could not generate a response."));

    let output = swea(&dir)
        .args(["--server", &url, "messages", "demo", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let messages: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "hello there");
    assert_eq!(messages[1]["origin"], "agent");

    swea(&dir)
        .args(["--server", &url, "state", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed:      false"));

    swea(&dir)
        .args(["--server", &url, "delete", "demo"])
        .assert()
        .success();
    swea(&dir)
        .args(["--server", &url, "messages", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found: demo"));

    assert!(dir.path().join(".swea/swea.db").exists());
    assert!(dir.path().join(".swea/logs/swea.log").exists());
}
