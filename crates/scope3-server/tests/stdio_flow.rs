use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use serde_json::{json, Value};

fn spawn_scope3d() -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_scope3d"))
        .env("SCOPE3D_TRANSPORT", "stdio")
        .env_remove("SCOPE3_DATASET")
        .env_remove("SCOPE3_CARBON_PRICE")
        .env_remove("SCOPE3_PARTITIONER")
        .env_remove("SCOPE3_VALIDATION")
        .env_remove("SCOPE3_TOP_N")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn scope3d")
}

#[test]
fn recommendations_stdio_flow_works() {
    let mut child = spawn_scope3d();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    let req = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": "recommendations",
            "arguments": {"carbon_price": 6000, "top_n": 2}
        }
    });
    writeln!(child_stdin, "{req}").expect("write request");
    drop(child_stdin);

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let response: Value = serde_json::from_str(&line).expect("parse response json");
    let recs = response["result"]["structuredContent"]["recommendations"]
        .as_array()
        .expect("recommendations");

    assert_eq!(response["result"]["structuredContent"]["carbon_price"], 6000.0);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["supplier"], "Epsilon");
    assert_eq!(recs[1]["supplier"], "Beta");

    let status = child.wait().expect("wait child");
    assert!(status.success());
}

fn write_framed(stdin: &mut std::process::ChildStdin, payload: &Value) {
    let body = serde_json::to_vec(payload).expect("serialize payload");
    let frame = format!("Content-Length: {}\r\n\r\n", body.len());
    stdin
        .write_all(frame.as_bytes())
        .expect("write frame header");
    stdin.write_all(&body).expect("write frame body");
    stdin.flush().expect("flush frame");
}

fn read_framed(reader: &mut BufReader<std::process::ChildStdout>) -> Value {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read frame header");
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let len = content_length.expect("content-length header");
    let mut body = vec![0_u8; len];
    std::io::Read::read_exact(reader, &mut body).expect("read frame body");
    serde_json::from_slice(&body).expect("parse framed response")
}

#[test]
fn stdio_content_length_price_round_trip() {
    let mut child = spawn_scope3d();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "stdio-test", "version": "1.0.0"}
            }
        }),
    );
    let init = read_framed(&mut reader);
    assert_eq!(init["result"]["protocolVersion"].as_str(), Some("2024-11-05"));
    assert_eq!(init["result"]["serverInfo"]["name"], "scope3-server");

    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "carbon_price_set", "arguments": {"carbon_price": 1000}}
        }),
    );
    let set = read_framed(&mut reader);
    assert_eq!(set["result"]["structuredContent"]["carbon_price"], 1000.0);

    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "decision_report", "arguments": {}}
        }),
    );
    let report = read_framed(&mut reader);
    let total_cost = report["result"]["structuredContent"]["summary"]["total_carbon_cost"]
        .as_f64()
        .expect("total carbon cost");
    assert!((total_cost - 205_880.0).abs() < 1e-6);

    drop(child_stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}
