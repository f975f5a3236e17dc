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

fn request_ok(
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
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        resp
    );
    resp.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

fn row_ids(data: &serde_json::Value) -> Vec<String> {
    data.as_object()
        .expect("data object")
        .keys()
        .cloned()
        .collect()
}

fn col_ids(data: &serde_json::Value, row_id: &str) -> Vec<String> {
    data.get(row_id)
        .and_then(|r| r.as_object())
        .expect("row object")
        .keys()
        .cloned()
        .collect()
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
        json!({ "info": {
            "id": "cs544",
            "colHdrs": [
                { "kind": "student", "id": "id", "hdr": "Student ID", "key": "id" },
                { "kind": "student", "id": "firstName", "hdr": "First Name", "key": "firstName" },
                { "kind": "numScore", "id": "quiz1", "hdr": "Quiz 1", "min": 0.0, "max": 10.0 },
                { "kind": "numScore", "id": "quiz2", "hdr": "Quiz 2", "min": 0.0, "max": 10.0 },
                { "kind": "aggrCol", "id": "total", "hdr": "Total", "aggrFn": "sum" }
            ],
            "rowHdrs": [
                { "kind": "aggrRow", "id": "$avg", "hdr": "Average", "aggrFn": "avg" }
            ]
        }}),
    );
    for (i, sid) in ["s1", "s2"].iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("en{}", i),
            "sections.enroll",
            json!({ "sectionId": "cs544", "studentId": sid }),
        );
    }
    let _ = request_ok(
        stdin,
        reader,
        "sc1",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s1", "colId": "quiz1", "score": 6 }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "sc2",
        "scores.add",
        json!({ "sectionId": "cs544", "studentId": "s2", "colId": "quiz1", "score": 8 }),
    );
}

#[test]
fn full_table_orders_rows_by_id_and_cols_by_schema() {
    let workspace = temp_dir("gradesd-data-full");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "sections.data",
        json!({ "sectionId": "cs544" }),
    );
    let data = result.get("data").expect("data");

    assert_eq!(row_ids(data), vec!["$avg", "s1", "s2"]);
    assert_eq!(
        col_ids(data, "s1"),
        vec!["id", "firstName", "quiz1", "quiz2", "total"]
    );
    // Identity cells come from enrollment seeding.
    assert_eq!(
        data.get("s1").and_then(|r| r.get("id")).and_then(|v| v.as_str()),
        Some("s1")
    );
    assert_eq!(
        data.get("s1")
            .and_then(|r| r.get("firstName"))
            .and_then(|v| v.as_str()),
        Some("Ada")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn row_filter_takes_precedence_and_keeps_given_order() {
    let workspace = temp_dir("gradesd-data-rows");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "sections.data",
        json!({
            "sectionId": "cs544",
            "rowIds": ["s2", "s1"],
            "colIds": ["quiz1"]
        }),
    );
    let data = result.get("data").expect("data");

    assert_eq!(row_ids(data), vec!["s2", "s1"]);
    // With a row filter present the column filter is ignored.
    assert_eq!(
        col_ids(data, "s2"),
        vec!["id", "firstName", "quiz1", "quiz2", "total"]
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn column_filter_projects_in_given_order() {
    let workspace = temp_dir("gradesd-data-cols");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "sections.data",
        json!({ "sectionId": "cs544", "colIds": ["quiz2", "quiz1"] }),
    );
    let data = result.get("data").expect("data");

    assert_eq!(row_ids(data), vec!["$avg", "s1", "s2"]);
    assert_eq!(col_ids(data, "s1"), vec!["quiz2", "quiz1"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn raw_data_covers_enrolled_students_without_aggregates() {
    let workspace = temp_dir("gradesd-data-raw");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "sections.rawData",
        json!({ "sectionId": "cs544" }),
    );
    let data = result.get("data").expect("data");

    assert_eq!(row_ids(data), vec!["s1", "s2"]);
    assert_eq!(col_ids(data, "s1"), vec!["id", "quiz1", "quiz2"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_row_and_aggr_rows_views() {
    let workspace = temp_dir("gradesd-data-views");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    setup(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "sr",
        "sections.studentRow",
        json!({ "sectionId": "cs544", "studentId": "s1" }),
    );
    let data = result.get("data").expect("data");
    assert_eq!(row_ids(data), vec!["s1"]);
    assert_eq!(
        data.get("s1").and_then(|r| r.get("total")).and_then(|v| v.as_f64()),
        Some(6.0)
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "ar",
        "sections.aggrRows",
        json!({ "sectionId": "cs544" }),
    );
    let data = result.get("data").expect("data");
    assert_eq!(row_ids(data), vec!["$avg"]);
    assert_eq!(
        data.get("$avg")
            .and_then(|r| r.get("quiz1"))
            .and_then(|v| v.as_f64()),
        Some(7.0)
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "ids",
        "sections.enrolledIds",
        json!({ "sectionId": "cs544" }),
    );
    assert_eq!(
        result.get("studentIds").cloned().unwrap_or(serde_json::Value::Null),
        json!(["s1", "s2"])
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
