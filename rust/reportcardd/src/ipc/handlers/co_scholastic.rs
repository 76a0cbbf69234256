use crate::editor;
use crate::error::{AppError, AppResult};
use crate::ipc::error::{app_err, err, no_workspace, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, CoScholasticRecord};
use crate::roster;
use crate::store::Store;
use serde_json::json;

enum StudentRef<'a> {
    Key(&'a str),
    Position(usize),
}

fn student_ref(req: &Request) -> Option<StudentRef<'_>> {
    if let Some(key) = req.params.get("studentKey").and_then(|v| v.as_str()) {
        return Some(StudentRef::Key(key));
    }
    req.params
        .get("position")
        .and_then(|v| v.as_u64())
        .and_then(|n| usize::try_from(n).ok())
        .map(StudentRef::Position)
}

/// Current position of the student, checked against the live roster.
fn resolve_position(store: &dyn Store, class_key: &str, who: &StudentRef<'_>) -> AppResult<usize> {
    let roster = roster::load_roster(store, class_key)?;
    let found = match who {
        StudentRef::Key(k) => roster.position_of(k),
        StudentRef::Position(p) => roster.get(*p).map(|e| e.position),
    };
    found.ok_or_else(|| AppError::NotFound("student not found".into()))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(who) = student_ref(req) else {
        return err(&req.id, "bad_params", "missing studentKey or position", None);
    };
    let position = match resolve_position(store, class_key, &who) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };
    match editor::load_co_scholastic_and_attendance(store, class_key, position) {
        Ok((grades, attendance)) => ok(
            &req.id,
            json!({
                "position": position,
                "grades": grades,
                "attendance": attendance
            }),
        ),
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(who) = student_ref(req) else {
        return err(&req.id, "bad_params", "missing studentKey or position", None);
    };
    let position = match resolve_position(store, class_key, &who) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };
    let grades = CoScholasticRecord::from_snapshot(req.params.get("grades"));
    let attendance = AttendanceRecord::from_snapshot(req.params.get("attendance"));

    let saved =
        editor::save_co_scholastic_and_attendance(store, class_key, position, &grades, &attendance);
    match saved {
        Ok(()) => ok(&req.id, json!({ "saved": true, "position": position })),
        Err(e) => app_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "coScholastic.open" => Some(handle_open(state, req)),
        "coScholastic.save" => Some(handle_save(state, req)),
        _ => None,
    }
}
