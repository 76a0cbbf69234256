use crate::config;
use crate::error::AppError;
use crate::ipc::error::{app_err, no_workspace, ok};
use crate::ipc::helpers::{required_index, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;

fn handle_student_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let position = match required_index(req, "position") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let labels = match config::subject_labels(store.conn()) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &AppError::from(e)),
    };
    match report::load_student_card(store, class_key, position, &labels) {
        Ok(card) => ok(&req.id, json!({ "card": card })),
        Err(e) => app_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentCard" => Some(handle_student_card(state, req)),
        _ => None,
    }
}
