use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::ZipWriter;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examwatchd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examwatchd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn export_then_import_restores_collections() {
    let source = temp_dir("examwatch-bundle-src");
    let restored = temp_dir("examwatch-bundle-dst");
    let bundle = source.join("export.ewbackup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "teacherId": "T1", "name": "Dr. Rao" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "violations.record",
        json!({ "studentId": "S1", "teacherId": "T1", "cameraId": "CAM1" }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportDataBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("examwatch-data-v1")
    );
    assert_eq!(exported.get("fileCount").and_then(|v| v.as_u64()), Some(2));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.importDataBundle",
        json!({
            "workspacePath": restored.to_string_lossy(),
            "inPath": bundle.to_string_lossy()
        }),
    );
    assert_eq!(imported.get("fileCount").and_then(|v| v.as_u64()), Some(2));

    // Point the daemon at the restored workspace and read the data back.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": restored.to_string_lossy() }),
    );
    let teachers = request_ok(&mut stdin, &mut reader, "7", "teachers.list", json!({}));
    assert_eq!(teachers.get("count").and_then(|v| v.as_u64()), Some(1));
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "violations.report",
        json!({}),
    );
    assert_eq!(report.get("count").and_then(|v| v.as_u64()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(restored);
}

#[test]
fn import_rejects_checksum_mismatch_and_unknown_format() {
    let workspace = temp_dir("examwatch-bundle-bad");

    // A bundle whose manifest lies about the payload hash.
    let tampered = workspace.join("tampered.zip");
    {
        let file = std::fs::File::create(&tampered).expect("create zip");
        let mut zip = ZipWriter::new(file);
        let opts = FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        let manifest = json!({
            "format": "examwatch-data-v1",
            "version": 1,
            "checksums": { "data/teachers.json": "deadbeef" }
        });
        zip.write_all(manifest.to_string().as_bytes())
            .expect("write manifest");
        zip.start_file("data/teachers.json", opts).expect("entry");
        zip.write_all(br#"{"teachers": []}"#).expect("write entry");
        zip.finish().expect("finish zip");
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let rejected = request(
        &mut stdin,
        &mut reader,
        "2",
        "backup.importDataBundle",
        json!({ "inPath": tampered.to_string_lossy() }),
    );
    assert_eq!(rejected.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        rejected
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bundle_import_failed")
    );

    // And one with a format tag we do not understand.
    let foreign = workspace.join("foreign.zip");
    {
        let file = std::fs::File::create(&foreign).expect("create zip");
        let mut zip = ZipWriter::new(file);
        let opts = FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        zip.write_all(br#"{"format": "someone-elses-backup"}"#)
            .expect("write manifest");
        zip.finish().expect("finish zip");
    }
    let rejected = request(
        &mut stdin,
        &mut reader,
        "3",
        "backup.importDataBundle",
        json!({ "inPath": foreign.to_string_lossy() }),
    );
    assert_eq!(rejected.get("ok").and_then(|v| v.as_bool()), Some(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
