use crate::auth;
use crate::ipc::error::{app_err, no_workspace, ok};
use crate::ipc::helpers::str_or_empty;
use crate::ipc::router::session_required;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    match auth::register(
        store.conn(),
        str_or_empty(req, "email"),
        str_or_empty(req, "password"),
    ) {
        Ok(session) => {
            let resp = ok(&req.id, json!({ "session": session }));
            state.session = Some(session);
            resp
        }
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    match auth::sign_in(
        store.conn(),
        str_or_empty(req, "email"),
        str_or_empty(req, "password"),
    ) {
        Ok(session) => {
            let resp = ok(&req.id, json!({ "session": session }));
            state.session = Some(session);
            resp
        }
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_signed_in = state.session.take().is_some();
    if was_signed_in {
        tracing::info!("signed out");
    }
    ok(&req.id, json!({ "signedOut": was_signed_in }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let account_exists = match state.store.as_ref() {
        Some(store) => match auth::has_accounts(store.conn()) {
            Ok(v) => v,
            Err(e) => return app_err(&req.id, &e),
        },
        None => false,
    };
    let required = match session_required(state) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };
    ok(
        &req.id,
        json!({
            "signedIn": state.session.is_some(),
            "session": state.session,
            "accountExists": account_exists,
            "sessionRequired": required
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
