use crate::error::{AppError, AppResult};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

pub const STUDENTS: &str = "students";
pub const SUBJECTS: &str = "subjects";
pub const MARKS: &str = "marks";
pub const CO_SCHOLASTIC: &str = "co_scholastic";
pub const ATTENDANCE: &str = "attendance";

/// A `/`-separated address into the document tree. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    pub fn root() -> Self {
        StorePath(String::new())
    }

    pub fn new(segments: &[&str]) -> AppResult<Self> {
        let mut p = StorePath::root();
        for s in segments {
            p = p.child(s)?;
        }
        Ok(p)
    }

    pub fn child(&self, segment: &str) -> AppResult<Self> {
        validate_segment(segment)?;
        if self.0.is_empty() {
            Ok(StorePath(segment.to_string()))
        } else {
            Ok(StorePath(format!("{}/{}", self.0, segment)))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Proper ancestors, nearest last. The root is not included.
    pub fn ancestors(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut acc = String::new();
        let segs: Vec<&str> = self.0.split('/').collect();
        for s in segs.iter().take(segs.len().saturating_sub(1)) {
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(s);
            out.push(acc.clone());
        }
        out
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.trim().is_empty() {
        return Err(AppError::validation("path segment must not be empty"));
    }
    if segment
        .chars()
        .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/') || c.is_control())
    {
        return Err(AppError::Validation(format!(
            "path segment {:?} contains a forbidden character",
            segment
        )));
    }
    Ok(())
}

pub fn students_path(class_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[STUDENTS, class_key])
}

pub fn student_path(class_key: &str, student_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[STUDENTS, class_key, student_key])
}

pub fn subjects_path(class_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[SUBJECTS, class_key])
}

pub fn subject_path(class_key: &str, subject_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[SUBJECTS, class_key, subject_key])
}

pub fn class_marks_path(class_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[MARKS, class_key])
}

pub fn marks_path(class_key: &str, exam: &str, subject_key: &str) -> AppResult<StorePath> {
    StorePath::new(&[MARKS, class_key, exam, subject_key])
}

pub fn co_scholastic_path(class_key: &str, position: usize) -> AppResult<StorePath> {
    StorePath::new(&[CO_SCHOLASTIC, class_key, &position.to_string()])
}

pub fn attendance_path(class_key: &str, position: usize) -> AppResult<StorePath> {
    StorePath::new(&[ATTENDANCE, class_key, &position.to_string()])
}

/// Hierarchical document store. Reads fetch a whole subtree; writes overwrite
/// the whole value at a path. Writing `null` or an empty object removes it.
pub trait Store {
    fn get(&self, path: &StorePath) -> anyhow::Result<Option<Value>>;

    fn set(&mut self, path: &StorePath, value: &Value) -> anyhow::Result<()>;

    /// Overwrites only the named children of `path`; siblings are kept.
    fn update(&mut self, path: &StorePath, fields: &Map<String, Value>) -> anyhow::Result<()>;

    /// Writes `value` under a freshly generated child key and returns the key.
    fn push(&mut self, path: &StorePath, value: &Value) -> anyhow::Result<String>;

    fn remove(&mut self, path: &StorePath) -> anyhow::Result<()> {
        self.set(path, &Value::Null)
    }

    fn exists(&self, path: &StorePath) -> anyhow::Result<bool> {
        Ok(self.get(path)?.is_some())
    }
}

/// Child keys in the order the hosted store enumerates them: integer-like keys
/// ascending numerically, then everything else lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn integer_key(k: &str) -> Option<u64> {
    if k.is_empty() || k.len() > 1 && k.starts_with('0') {
        return None;
    }
    if !k.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    k.parse::<u64>().ok()
}

pub fn ordered_children(value: &Value) -> Vec<(&str, &Value)> {
    let mut out: Vec<(&str, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        _ => Vec::new(),
    };
    out.sort_by(|a, b| compare_keys(a.0, b.0));
    out
}

/// Flattens `value` into `(path, scalar_json)` leaf rows rooted at `base`.
/// Arrays are stored as objects keyed by index, nulls and empty objects vanish.
pub fn flatten(base: &str, value: &Value, out: &mut Vec<(String, String)>) {
    let join = |k: &str| {
        if base.is_empty() {
            k.to_string()
        } else {
            format!("{}/{}", base, k)
        }
    };
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&join(k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), v, out);
            }
        }
        scalar => out.push((base.to_string(), scalar.to_string())),
    }
}

/// Rebuilds the subtree at `base` from leaf rows whose paths are `base` or
/// below it.
pub fn rebuild(base: &str, rows: &[(String, String)]) -> anyhow::Result<Option<Value>> {
    let mut root: Option<Value> = None;
    for (path, raw) in rows {
        let leaf: Value = serde_json::from_str(raw)?;
        let rel = if base.is_empty() {
            path.as_str()
        } else if path == base {
            ""
        } else {
            match path.strip_prefix(base).and_then(|r| r.strip_prefix('/')) {
                Some(r) => r,
                None => continue,
            }
        };
        if rel.is_empty() {
            return Ok(Some(leaf));
        }
        let node = root.get_or_insert_with(|| Value::Object(Map::new()));
        insert_leaf(node, rel.split('/'), leaf);
    }
    Ok(root)
}

fn insert_leaf<'a>(node: &mut Value, mut segs: impl Iterator<Item = &'a str>, leaf: Value) {
    let Some(seg) = segs.next() else {
        *node = leaf;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_leaf(child, segs, leaf);
    }
}

/// Generates push keys that sort in creation order: 12 hex digits of epoch
/// milliseconds, kept strictly increasing, plus 8 random hex digits.
#[derive(Debug, Default)]
pub struct PushKeys {
    last_millis: i64,
}

impl PushKeys {
    pub fn next_key(&mut self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let millis = if now > self.last_millis {
            now
        } else {
            self.last_millis + 1
        };
        self.last_millis = millis;
        let rand = uuid::Uuid::new_v4().simple().to_string();
        format!("k{:012x}{}", millis, &rand[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_rejects_forbidden_segments() {
        assert!(StorePath::new(&["students", "class1"]).is_ok());
        assert!(matches!(
            StorePath::new(&["students", ""]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            StorePath::new(&["students", "a.b"]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            StorePath::new(&["students", "a/b"]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn ancestors_exclude_self() {
        let p = StorePath::new(&["marks", "class1", "final"]).expect("path");
        assert_eq!(p.ancestors(), vec!["marks", "marks/class1"]);
        assert!(StorePath::root().ancestors().is_empty());
    }

    #[test]
    fn integer_keys_sort_before_strings_and_numerically() {
        let v = json!({ "10": 1, "2": 2, "b": 3, "a": 4, "02": 5 });
        let keys: Vec<&str> = ordered_children(&v).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["2", "10", "02", "a", "b"]);
    }

    #[test]
    fn flatten_then_rebuild_keeps_nested_shape() {
        let v = json!({
            "class1": { "k1": { "name": "A", "roll": 1 }, "empty": {} },
            "list": [7, null, 9]
        });
        let mut rows = Vec::new();
        flatten("students", &v, &mut rows);
        assert_eq!(rows.len(), 4);
        let back = rebuild("students", &rows).expect("rebuild").expect("some");
        assert_eq!(
            back,
            json!({
                "class1": { "k1": { "name": "A", "roll": 1 } },
                "list": { "0": 7, "2": 9 }
            })
        );
    }

    #[test]
    fn rebuild_returns_scalar_at_base() {
        let rows = vec![("subjects/class1/math".to_string(), "\"Math\"".to_string())];
        let v = rebuild("subjects/class1/math", &rows).expect("rebuild");
        assert_eq!(v, Some(json!("Math")));
    }

    #[test]
    fn push_keys_are_strictly_increasing() {
        let mut keys = PushKeys::default();
        let generated: Vec<String> = (0..50).map(|_| keys.next_key()).collect();
        for pair in generated.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }
}
