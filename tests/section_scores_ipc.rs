use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

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

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradesd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradesd");
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
    let payload = json!({ "id": id, "method": method, "params": params });
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
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        resp
    );
    resp.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn entry_at(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    section_id: &str,
    row_id: &str,
    col_id: &str,
) -> serde_json::Value {
    let result = request_ok(
        stdin,
        reader,
        "entry",
        "scores.entry",
        json!({ "sectionId": section_id, "rowId": row_id, "colId": col_id }),
    );
    result.get("entry").cloned().unwrap_or(serde_json::Value::Null)
}

fn section_info() -> serde_json::Value {
    json!({
        "id": "cs544",
        "colHdrs": [
            { "kind": "student", "id": "id", "hdr": "Student ID", "key": "id" },
            { "kind": "numScore", "id": "quiz1", "hdr": "Quiz 1", "min": 0.0, "max": 10.0 },
            { "kind": "numScore", "id": "quiz2", "hdr": "Quiz 2", "min": 0.0, "max": 10.0 },
            { "kind": "textScore", "id": "grade", "hdr": "Grade", "vals": ["A", "B", "C"] },
            { "kind": "aggrCol", "id": "total", "hdr": "Total", "aggrFn": "sum" }
        ],
        "rowHdrs": [
            { "kind": "aggrRow", "id": "$avg", "hdr": "Average", "aggrFn": "avg" }
        ]
    })
}

fn setup(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "st",
        "students.upsertMany",
        json!({ "students": [
            { "id": "s1", "firstName": "Ada", "lastName": "Lovelace" },
            { "id": "s2", "firstName": "Alan", "lastName": "Turing" }
        ]}),
    );
    let _ = request_ok(
        stdin,
        reader,
        "sec",
        "sections.create",
        json!({ "info": section_info() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "en1",
        "sections.enroll",
        json!({ "sectionId": "cs544", "studentId": "s1" }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "en2",
        "sections.enroll",
        json!({ "sectionId": "cs544", "studentId": "s2" }),
    );
}

#[test]
fn valid_score_updates_aggregates_in_both_phases() {
    let workspace = temp_dir("gradesd-scores-valid");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc1",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": 7 }),
    );

    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "quiz1").as_f64(),
        Some(7.0)
    );
    // Row aggregate over the one filled quiz.
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "total").as_f64(),
        Some(7.0)
    );
    // Column aggregate over enrolled students with data.
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "$avg", "quiz1").as_f64(),
        Some(7.0)
    );

    // Column aggregates see updated row aggregates, never stale ones.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s2", "colId": "quiz1", "score": 9 }),
    );
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "$avg", "quiz1").as_f64(),
        Some(8.0)
    );
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "$avg", "total").as_f64(),
        Some(8.0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn out_of_range_score_is_rejected_and_nothing_changes() {
    let workspace = temp_dir("gradesd-scores-range");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc1",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": 7 }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "sc2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": 15 }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&resp), "bad_content");

    // Cell and aggregates keep their prior values.
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "quiz1").as_f64(),
        Some(7.0)
    );
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "total").as_f64(),
        Some(7.0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn text_scores_validate_against_allowed_values() {
    let workspace = temp_dir("gradesd-scores-text");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc1",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "grade", "score": "B" }),
    );
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "grade").as_str(),
        Some("B")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "sc2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "grade", "score": "F" }),
    );
    assert_eq!(error_code(&resp), "bad_content");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn structural_errors_use_the_right_codes() {
    let workspace = temp_dir("gradesd-scores-errors");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let resp = request(
        &mut stdin,
        &mut reader,
        "e1",
        "scores.add",
        json!({ "sectionId": "nope", "studentId": "s1", "colId": "quiz1", "score": 5 }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let resp = request(
        &mut stdin,
        &mut reader,
        "e2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "ghost", "colId": "quiz1", "score": 5 }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let resp = request(
        &mut stdin,
        &mut reader,
        "e3",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "nope", "score": 5 }),
    );
    assert_eq!(error_code(&resp), "not_found");

    // Known student who is not enrolled: the content is wrong, not missing.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "st3",
        "students.upsert",
        json!({ "student": { "id": "s3", "firstName": "Grace", "lastName": "Hopper" } }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "e4",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s3", "colId": "quiz1", "score": 5 }),
    );
    assert_eq!(error_code(&resp), "bad_content");

    // Scores land only in scorable columns.
    let resp = request(
        &mut stdin,
        &mut reader,
        "e5",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "total", "score": 5 }),
    );
    assert_eq!(error_code(&resp), "bad_content");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn clearing_a_cell_with_null_recomputes_aggregates() {
    let workspace = temp_dir("gradesd-scores-clear");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc1",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": 7 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sc2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": null }),
    );

    assert!(entry_at(&mut stdin, &mut reader, "cs544", "s1", "quiz1").is_null());
    // sum over no data is 0; avg over no data is empty.
    assert_eq!(
        entry_at(&mut stdin, &mut reader, "cs544", "s1", "total").as_f64(),
        Some(0.0)
    );
    assert!(entry_at(&mut stdin, &mut reader, "cs544", "$avg", "quiz1").is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
