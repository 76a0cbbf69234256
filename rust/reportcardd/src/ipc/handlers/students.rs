use crate::config;
use crate::editor::{self, DeleteOutcome, DELETE_PROMPT};
use crate::error::AppError;
use crate::ipc::error::{app_err, no_workspace, ok};
use crate::ipc::helpers::{required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match roster::load_roster(store, class_key) {
        Ok(roster) => ok(
            &req.id,
            json!({
                "positions": roster.positions(),
                "students": roster.entries,
                "excluded": roster.excluded
            }),
        ),
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    match editor::add_student(store, str_or_empty(req, "classKey"), str_or_empty(req, "name")) {
        Ok(student) => ok(
            &req.id,
            json!({
                "studentKey": student.key,
                "name": student.name,
                "roll": student.to_store_value()["roll"].clone()
            }),
        ),
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_students_update_name(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_key = match required_str(req, "studentKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match editor::update_student_name(store, class_key, student_key, str_or_empty(req, "name")) {
        Ok(updated) => ok(&req.id, json!({ "updated": updated })),
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_key = match required_str(req, "studentKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let confirmed = req
        .params
        .get("confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let cascade = match config::cascade_delete(store.conn()) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &AppError::from(e)),
    };

    // The caller answers the prompt by resending with `confirmed: true`.
    let mut answer = |_: &str| confirmed;
    match editor::delete_student(store, class_key, student_key, &mut answer, cascade) {
        Ok(DeleteOutcome::Declined) => ok(
            &req.id,
            json!({
                "deleted": false,
                "confirmRequired": true,
                "prompt": DELETE_PROMPT
            }),
        ),
        Ok(DeleteOutcome::Deleted { cascaded }) => {
            ok(&req.id, json!({ "deleted": true, "cascaded": cascaded }))
        }
        Err(e) => app_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.updateName" => Some(handle_students_update_name(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
