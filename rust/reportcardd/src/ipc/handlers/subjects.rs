use crate::config;
use crate::editor;
use crate::error::AppError;
use crate::ipc::error::{app_err, no_workspace, ok};
use crate::ipc::helpers::{required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let labels = match config::subject_labels(store.conn()) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &AppError::from(e)),
    };
    match editor::list_subjects(store, class_key) {
        Ok(subjects) => {
            let subjects: Vec<serde_json::Value> = subjects
                .into_iter()
                .map(|s| {
                    json!({
                        "key": s.key,
                        "displayName": s.display_name,
                        "label": labels.format(&s.key)
                    })
                })
                .collect();
            ok(&req.id, json!({ "subjects": subjects }))
        }
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    match editor::add_subject(store, str_or_empty(req, "classKey"), str_or_empty(req, "name")) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => app_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        _ => None,
    }
}
