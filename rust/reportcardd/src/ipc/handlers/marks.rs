use crate::config;
use crate::editor;
use crate::error::{AppError, AppResult};
use crate::ipc::error::{app_err, err, no_workspace, ok};
use crate::ipc::helpers::{required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::model::{self, ExamComponent};
use crate::roster;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn handle_marks_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return no_workspace(&req.id);
    };
    let class_key = match required_str(req, "classKey") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let exam_raw = str_or_empty(req, "exam");
    let Some(exam) = ExamComponent::parse(exam_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown exam: {}", exam_raw),
            Some(json!({ "exams": ExamComponent::ALL.map(|c| c.key()) })),
        );
    };

    let marks_cfg = match config::marks_config(store.conn()) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &AppError::from(e)),
    };
    let roster = match roster::load_roster(store, class_key) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };
    let scores = match editor::load_marks(store, class_key, exam, subject) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };

    let rows: Vec<Value> = roster
        .entries
        .iter()
        .map(|e| {
            json!({
                "position": e.position,
                "studentKey": e.key,
                "displayRoll": e.display_roll,
                "name": e.name,
                "score": scores.get(&e.position)
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "classKey": class_key,
            "exam": exam.key(),
            "subject": subject,
            "maxScore": marks_cfg.max_for(exam),
            "enforceMaxima": marks_cfg.enforce_maxima,
            "rows": rows,
            "excluded": roster.excluded
        }),
    )
}

/// `null`, `""`, and whitespace are blank; anything else must be numeric.
fn entry_score(v: &Value) -> AppResult<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        other => model::score_from_value(other)
            .map(Some)
            .ok_or_else(|| AppError::validation("Marks must be numbers")),
    }
}

/// Accepts `{ "0": 55, "1": "" }`, `[55, null]`, or `[{ position, score }]`.
fn parse_entries(v: Option<&Value>) -> AppResult<BTreeMap<usize, Option<f64>>> {
    let mut out = BTreeMap::new();
    match v {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (k, score) in map {
                let pos = k
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| AppError::Validation(format!("invalid position: {}", k)))?;
                out.insert(pos, entry_score(score)?);
            }
        }
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                match item.get("position") {
                    Some(p) => {
                        let pos = p
                            .as_u64()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| AppError::validation("invalid position"))?;
                        let score = item.get("score").unwrap_or(&Value::Null);
                        out.insert(pos, entry_score(score)?);
                    }
                    None => {
                        out.insert(i, entry_score(item)?);
                    }
                }
            }
        }
        Some(_) => return Err(AppError::validation("entries must be an object or array")),
    }
    Ok(out)
}

fn handle_marks_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return no_workspace(&req.id);
    };
    let entries = match parse_entries(req.params.get("entries")) {
        Ok(v) => v,
        Err(e) => return app_err(&req.id, &e),
    };
    let exam = str_or_empty(req, "exam");
    let limit = match ExamComponent::parse(exam) {
        Some(c) => match config::marks_config(store.conn()) {
            Ok(cfg) => cfg.limit_for(c),
            Err(e) => return app_err(&req.id, &AppError::from(e)),
        },
        None => None,
    };
    match editor::save_marks(
        store,
        str_or_empty(req, "classKey"),
        exam,
        str_or_empty(req, "subject"),
        &entries,
        limit,
    ) {
        Ok(saved) => ok(&req.id, json!({ "saved": saved })),
        Err(e) => app_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.open" => Some(handle_marks_open(state, req)),
        "marks.save" => Some(handle_marks_save(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_accept_map_and_array_shapes() {
        let map = parse_entries(Some(&json!({ "0": 55, "2": "", "3": "61" }))).expect("map");
        assert_eq!(map.get(&0), Some(&Some(55.0)));
        assert_eq!(map.get(&2), Some(&None));
        assert_eq!(map.get(&3), Some(&Some(61.0)));

        let arr = parse_entries(Some(&json!([40, null, " "]))).expect("array");
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(&0), Some(&Some(40.0)));
        assert_eq!(arr.get(&1), Some(&None));

        let rows = parse_entries(Some(&json!([{ "position": 4, "score": 12 }]))).expect("rows");
        assert_eq!(rows.get(&4), Some(&Some(12.0)));
    }

    #[test]
    fn non_numeric_entries_are_rejected() {
        assert!(matches!(
            parse_entries(Some(&json!({ "0": "abc" }))),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_entries(Some(&json!({ "x": 1 }))),
            Err(AppError::Validation(_))
        ));
    }
}
