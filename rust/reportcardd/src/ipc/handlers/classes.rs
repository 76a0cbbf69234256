use crate::editor;
use crate::ipc::error::{app_err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use crate::labels::format_class_label;
use crate::roster;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let keys = match editor::list_classes(store) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };

    let mut classes = Vec::with_capacity(keys.len());
    for key in keys {
        let roster = match roster::load_roster(store, &key) {
            Ok(v) => v,
            Err(e) => return app_err(&req.id, &e),
        };
        classes.push(json!({
            "classKey": key,
            "label": format_class_label(&key),
            "studentCount": roster.len(),
            "excludedCount": roster.excluded.len()
        }));
    }
    ok(&req.id, json!({ "classes": classes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        _ => None,
    }
}
