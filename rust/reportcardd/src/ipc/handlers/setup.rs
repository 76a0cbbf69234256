use crate::config::{self, Section};
use crate::error::AppError;
use crate::ipc::error::{app_err, err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let mut out = Map::new();
    for section in Section::ALL {
        match config::load_section(store.conn(), section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return app_err(&req.id, &AppError::from(e)),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = Section::parse(section_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown section: {}", section_raw),
            None,
        );
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    match config::update_section(store.conn(), section, patch) {
        Ok(Ok(current)) => {
            tracing::info!(section = section.name(), "setup updated");
            ok(&req.id, json!({ "section": section.name(), "value": current }))
        }
        Ok(Err(msg)) => err(&req.id, "bad_params", msg, None),
        Err(e) => app_err(&req.id, &AppError::from(e)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
