use crate::ipc::error::err;
use crate::ipc::types::Request;
use serde_json::Value;

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) => Ok(v),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

/// Missing or non-string values read as `""` so the service layer reports
/// its own validation message.
pub fn str_or_empty<'a>(req: &'a Request, key: &str) -> &'a str {
    req.params.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

pub fn required_index(req: &Request, key: &str) -> Result<usize, Value> {
    match req.params.get(key).and_then(|v| v.as_u64()) {
        Some(v) => usize::try_from(v)
            .map_err(|_| err(&req.id, "bad_params", format!("{} out of range", key), None)),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("missing {} (non-negative integer)", key),
            None,
        )),
    }
}
