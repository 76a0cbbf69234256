use super::handlers;
use super::types::{AppState, Request};
use crate::auth;
use crate::config;
use crate::error::{AppError, AppResult};
use crate::ipc::error::{app_err, err, no_workspace};

fn is_public(method: &str) -> bool {
    matches!(method, "health" | "workspace.select") || method.starts_with("auth.")
}

/// A session is needed once an account exists and the workspace asks for one.
pub fn session_required(state: &AppState) -> AppResult<bool> {
    let Some(store) = state.store.as_ref() else {
        return Ok(false);
    };
    Ok(config::require_session(store.conn())? && auth::has_accounts(store.conn())?)
}

fn gate(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    if is_public(&req.method) {
        return None;
    }
    if state.store.is_none() {
        return Some(no_workspace(&req.id));
    }
    match session_required(state) {
        Ok(true) if state.session.is_none() => {
            tracing::warn!(method = %req.method, "rejected without session");
            Some(app_err(&req.id, &AppError::Unauthenticated))
        }
        Ok(_) => None,
        Err(e) => Some(app_err(&req.id, &e)),
    }
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    if let Some(resp) = gate(state, &req) {
        return resp;
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::classes::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::subjects::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::marks::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::co_scholastic::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
