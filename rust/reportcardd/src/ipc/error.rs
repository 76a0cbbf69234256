use crate::error::AppError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Error reply for a service failure. Store failures reply with a fixed
/// message; the underlying detail only reaches the log.
pub fn app_err(id: &str, e: &AppError) -> serde_json::Value {
    if let AppError::RemoteIo(detail) = e {
        tracing::error!(request = id, error = %detail, "store request failed");
    }
    err(id, e.code(), e.to_string(), None)
}

pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::editor;

    #[test]
    fn store_failure_reply_hides_the_driver_error() {
        let mut s = SqliteStore::open_in_memory().expect("store");
        s.conn().execute("DROP TABLE nodes", []).expect("drop");
        let e = editor::add_student(&mut s, "class1", "Asha").expect_err("store failure");
        assert!(matches!(e, AppError::RemoteIo(ref d) if d.contains("nodes")));

        let reply = app_err("7", &e);
        assert_eq!(reply["ok"], json!(false));
        assert_eq!(reply["error"]["code"], json!("remote_io"));
        assert_eq!(reply["error"]["message"], json!("store request failed"));
        assert!(!reply.to_string().contains("nodes"));
        assert!(!reply.to_string().contains("SQL"));
    }

    #[test]
    fn validation_reply_keeps_its_message() {
        let reply = app_err("8", &AppError::validation("Marks must be numbers"));
        assert_eq!(reply["error"]["code"], json!("validation_error"));
        assert_eq!(reply["error"]["message"], json!("Marks must be numbers"));
    }
}
