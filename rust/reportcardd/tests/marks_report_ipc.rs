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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(v: &serde_json::Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
}

fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> Vec<String> {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mut keys = Vec::new();
    for name in ["Asha", "Bina"] {
        let created = request_ok(
            stdin,
            reader,
            &format!("add-{}", name),
            "students.create",
            json!({ "classKey": "class1", "name": name }),
        );
        keys.push(created["studentKey"].as_str().expect("key").to_string());
    }
    for name in ["Math", "English"] {
        request_ok(
            stdin,
            reader,
            &format!("subject-{}", name),
            "subjects.create",
            json!({ "classKey": "class1", "name": name }),
        );
    }
    keys
}

#[test]
fn marks_save_validates_and_reopens_by_position() {
    let workspace = temp_dir("reportcard-marks");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_workspace(&mut stdin, &mut reader, &workspace);

    let dup = request(
        &mut stdin,
        &mut reader,
        "1",
        "subjects.create",
        json!({ "classKey": "class1", "name": "ma th" }),
    );
    assert_eq!(error_code(&dup), Some("duplicate_key"));

    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.list",
        json!({ "classKey": "class1" }),
    );
    let math = subjects["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .find(|s| s["key"] == json!("math"))
        .cloned()
        .expect("math subject");
    assert_eq!(math["displayName"], json!("Math"));
    assert_eq!(math["label"], json!("MATHEMATICS"));

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.save",
        json!({
            "classKey": "class1",
            "exam": "final",
            "subject": "math",
            "entries": { "0": 70, "1": "" },
        }),
    );
    assert_eq!(saved["saved"], json!(1));

    let grid = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.open",
        json!({ "classKey": "class1", "exam": "final", "subject": "math" }),
    );
    assert_eq!(grid["maxScore"], json!(80.0));
    assert_eq!(grid["rows"][0]["name"], json!("Asha"));
    assert_eq!(grid["rows"][0]["score"], json!(70.0));
    assert_eq!(grid["rows"][1]["score"], json!(null));

    let over = request(
        &mut stdin,
        &mut reader,
        "5",
        "marks.save",
        json!({ "classKey": "class1", "exam": "final", "subject": "math", "entries": { "0": 81 } }),
    );
    assert_eq!(error_code(&over), Some("validation_error"));
    assert_eq!(over["error"]["message"], json!("Marks must be between 0 and 80"));

    let empty = request(
        &mut stdin,
        &mut reader,
        "6",
        "marks.save",
        json!({
            "classKey": "class1",
            "exam": "final",
            "subject": "math",
            "entries": { "0": "", "1": null },
        }),
    );
    assert_eq!(empty["error"]["message"], json!("No marks entered"));

    let quiz = request(
        &mut stdin,
        &mut reader,
        "7",
        "marks.save",
        json!({ "classKey": "class1", "exam": "quiz", "subject": "math", "entries": { "0": 5 } }),
    );
    assert_eq!(error_code(&quiz), Some("validation_error"));

    // The rejected saves left the stored score alone.
    let grid = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "marks.open",
        json!({ "classKey": "class1", "exam": "final", "subject": "math" }),
    );
    assert_eq!(grid["rows"][0]["score"], json!(70.0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_card_combines_marks_grades_and_attendance() {
    let workspace = temp_dir("reportcard-card");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let keys = open_workspace(&mut stdin, &mut reader, &workspace);

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.save",
        json!({ "classKey": "class1", "exam": "final", "subject": "math", "entries": { "0": 70 } }),
    );
    for (i, (exam, score)) in [("internal1", 20), ("midterm", 80), ("internal2", 20), ("final", 80)]
        .iter()
        .enumerate()
    {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("e{}", i),
            "marks.save",
            json!({ "classKey": "class1", "exam": exam, "subject": "english", "entries": [score] }),
        );
    }
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "coScholastic.save",
        json!({
            "classKey": "class1",
            "studentKey": keys[1],
            "grades": { "discipline": "A", "supw": "B" },
            "attendance": { "sem1_working": "20", "sem1_present": 18 }
        }),
    );

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.studentCard",
        json!({ "classKey": "class1", "position": 0 }),
    );
    let card = &card["card"];
    assert_eq!(card["header"]["name"], json!("ASHA"));
    assert_eq!(card["header"]["displayRoll"], json!("01"));
    assert_eq!(card["header"]["classLabel"], json!("Class I"));
    assert_eq!(card["rows"][0]["subjectKey"], json!("english"));
    assert_eq!(card["rows"][0]["subjectTotal"], json!(100));
    assert_eq!(card["rows"][0]["grade"], json!("A+"));
    assert_eq!(card["rows"][1]["label"], json!("MATHEMATICS"));
    assert_eq!(card["rows"][1]["weighted60"], json!(42));
    assert_eq!(card["rows"][1]["grade"], json!("D"));
    assert_eq!(card["rows"][1]["present"]["midterm"], json!(false));
    assert_eq!(card["overall"]["grandTotal"], json!(142));
    assert_eq!(card["overall"]["subjectCount"], json!(2));
    assert_eq!(card["overall"]["percentageText"], json!("71.00"));
    assert_eq!(card["attendance"]["sem1Percentage"], json!("unavailable"));

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.studentCard",
        json!({ "classKey": "class1", "position": 1 }),
    );
    let card = &card["card"];
    assert_eq!(card["header"]["name"], json!("BINA"));
    assert_eq!(card["overall"]["grandTotal"], json!(0));
    assert_eq!(card["coScholastic"]["discipline"], json!("A"));
    assert_eq!(card["coScholastic"]["display"]["uniform"], json!("—"));
    assert_eq!(card["attendance"]["sem1_working"], json!(20));
    assert_eq!(card["attendance"]["sem1Percentage"], json!("90.00%"));
    assert_eq!(card["attendance"]["sem2Percentage"], json!("unavailable"));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "coScholastic.open",
        json!({ "classKey": "class1", "position": 1 }),
    );
    assert_eq!(opened["grades"]["supw"], json!("B"));
    assert_eq!(opened["attendance"]["sem2_present"], json!(""));

    let missing = request(
        &mut stdin,
        &mut reader,
        "6",
        "reports.studentCard",
        json!({ "classKey": "class1", "position": 5 }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
