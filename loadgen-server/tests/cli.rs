use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::{Value, json};

const LOADGEN_EXE: &str = env!("CARGO_BIN_EXE_loadgen");

fn loadgen(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(LOADGEN_EXE)
        .args(args)
        .env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn subprocess");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();

    child.wait_with_output().expect("Failed to wait on child process")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "Process exited with non-zero status: {:?}\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn run_prints_handler_response() {
    let output = loadgen(&["run", "--context", r#"{"id":"abc"}"#], r#"{"prime": 7919}"#);
    let response = stdout_json(&output);

    assert_eq!(response["statusCode"], 200);
    let body: Value = serde_json::from_str(response["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["message"], "test done");
    assert_eq!(body["context"], json!({"id": "abc"}));
    assert_eq!(body["details"], json!(["job=prime", "probable_prime=true"]));
}

#[test]
fn run_answers_invalid_jobs() {
    let output = loadgen(&["run", "-"], r#"{"cpu": 1}"#);
    let response = stdout_json(&output);

    assert_eq!(
        response,
        json!({"statusCode": 200, "body": r#"{"error":"job not defined correctly"}"#})
    );
}

#[test]
fn run_rejects_malformed_input() {
    let output = loadgen(&["run"], "{not json");
    assert!(!output.status.success());
}

#[test]
fn preset_prints_runnable_job() {
    let output = loadgen(&["preset", "memory", "1"], "");
    let job = stdout_json(&output);

    assert_eq!(
        job,
        json!({"memory": {"operator_size": 1000, "itterations": 10000, "recursion_depth": 20}})
    );
}

#[test]
fn io_preset_needs_target() {
    let output = loadgen(&["preset", "io", "0"], "");
    assert!(!output.status.success());
}

#[test]
fn pmemory_runs() {
    let output = loadgen(&["pmemory", "80", "16", "4", "--threads", "2"], "");
    assert!(output.status.success());
}
