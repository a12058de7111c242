#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use cdpchan::frame::{FrameReader, MessageType};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cdpchan-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn cdpchan(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cdpchan"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("cdpchan should run")
}

fn cdpchan_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cdpchan"))
        .args(["--log-level", "error"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("cdpchan should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should be writable");
    child.wait_with_output().expect("cdpchan should exit")
}

#[test]
fn encode_writes_a_session_frame() {
    let output = cdpchan(&[
        "encode",
        "--channel",
        "12",
        "--session-id",
        "99",
        "--message-id",
        "7",
        "--data",
        "hello",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let mut reader = FrameReader::new(output.stdout.as_slice());
    let frame = reader.read_frame().expect("stdout should hold one frame");
    assert_eq!(frame.header.message_type, MessageType::Session);
    assert_eq!(frame.header.channel_id, 12);
    assert_eq!(frame.header.session_id, 99);
    assert_eq!(frame.payload.as_ref(), b"\x00\x00\x00\x07hello");
    assert!(reader.next().is_none());
}

#[test]
fn encode_fragments_large_payloads() {
    let output = cdpchan(&[
        "encode",
        "--hex",
        &"ab".repeat(300),
        "--max-fragment",
        "128",
    ]);
    assert!(output.status.success());

    let frames: Vec<_> = FrameReader::new(output.stdout.as_slice())
        .collect::<Result<_, _>>()
        .expect("frames should decode");
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.header.fragment_count == 3));
}

#[test]
fn encode_caps_fragments_at_the_frame_limit() {
    let dir = unique_temp_dir("max-fragment");
    let path = dir.join("payload.bin");
    std::fs::write(&path, vec![0x5a; 100_000]).expect("payload file should be writable");

    let output = cdpchan(&[
        "encode",
        "--file",
        path.to_str().expect("temp path should be utf-8"),
        "--max-fragment",
        "70000",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let frames: Vec<_> = FrameReader::new(output.stdout.as_slice())
        .collect::<Result<_, _>>()
        .expect("frames should decode");
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.wire_size() <= usize::from(u16::MAX)));
    let body: usize = frames.iter().map(|f| f.payload.len()).sum();
    assert_eq!(body, 100_000 + 4);
}

#[test]
fn hex_encode_then_decode_json() {
    let encoded = cdpchan(&[
        "encode",
        "--channel",
        "3",
        "--message-id",
        "42",
        "--data",
        "ping",
        "--header",
        "1=0000000000000010",
        "--hex-output",
    ]);
    assert!(encoded.status.success());

    let decoded = cdpchan_with_stdin(
        &["--format", "json", "decode", "--hex-input"],
        &encoded.stdout,
    );
    assert!(decoded.status.success(), "stderr: {}", String::from_utf8_lossy(&decoded.stderr));

    let stdout = String::from_utf8(decoded.stdout).expect("json output should be utf-8");
    let line: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("output should be one json object");
    assert_eq!(line["message_type"], "session");
    assert_eq!(line["channel_id"], 3);
    assert_eq!(line["message_id"], 42);
    assert_eq!(line["body"], "ping");
    assert_eq!(line["additional_headers"][0]["header_type"], 1);
    assert_eq!(line["additional_headers"][0]["value"], "0000000000000010");
}

#[test]
fn decode_reads_frames_from_file() {
    let dir = unique_temp_dir("decode-file");
    let path = dir.join("frames.bin");
    let encoded = cdpchan(&["encode", "--channel", "4", "--data", "from file"]);
    std::fs::write(&path, &encoded.stdout).expect("frame file should be writable");

    let output = cdpchan(&[
        "--format",
        "pretty",
        "decode",
        path.to_str().expect("temp path should be utf-8"),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("channel=4"), "stdout: {stdout}");
    assert!(stdout.contains("body=from file"), "stdout: {stdout}");
}

#[test]
fn decode_rejects_malformed_input() {
    let output = cdpchan_with_stdin(&["decode"], &[0x12; 64]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn encode_rejects_invalid_header() {
    let output = cdpchan(&["encode", "--header", "0=aa"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn decode_missing_file_fails() {
    let output = cdpchan(&["decode", "/nonexistent/cdpchan/frames.bin"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn version_prints_package_version() {
    let output = cdpchan(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("cdpchan {}", env!("CARGO_PKG_VERSION"))
    );
}
