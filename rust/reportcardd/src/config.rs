use crate::db;
use crate::labels::SubjectLabels;
use crate::model::ExamComponent;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Marks,
    Labels,
    Students,
    Security,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Marks,
        Section::Labels,
        Section::Students,
        Section::Security,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marks" => Some(Self::Marks),
            "labels" => Some(Self::Labels),
            "students" => Some(Self::Students),
            "security" => Some(Self::Security),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Marks => "marks",
            Self::Labels => "labels",
            Self::Students => "students",
            Self::Security => "security",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Marks => "setup.marks",
            Self::Labels => "setup.labels",
            Self::Students => "setup.students",
            Self::Security => "setup.security",
        }
    }
}

fn default_section(section: Section) -> Value {
    match section {
        Section::Marks => json!({
            "examMaxima": {
                "internal1": 20,
                "midterm": 80,
                "internal2": 20,
                "final": 80
            },
            "enforceMaxima": true
        }),
        Section::Labels => json!({ "subjectLabels": {} }),
        Section::Students => json!({ "cascadeDelete": false }),
        Section::Security => json!({ "requireSession": true }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: Section,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            Section::Marks => match k.as_str() {
                "examMaxima" => {
                    let Some(patch_maxima) = v.as_object() else {
                        return Err("examMaxima must be an object".into());
                    };
                    let maxima = obj
                        .entry("examMaxima".to_string())
                        .or_insert_with(|| json!({}));
                    let Some(maxima) = maxima.as_object_mut() else {
                        return Err("examMaxima must be an object".into());
                    };
                    for (exam, max) in patch_maxima {
                        if ExamComponent::parse(exam).is_none() {
                            return Err(format!("unknown exam: {}", exam));
                        }
                        let n = parse_i64_range(max, exam, 1, 1000)?;
                        maxima.insert(exam.clone(), Value::from(n));
                    }
                }
                "enforceMaxima" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown marks field: {}", k)),
            },
            Section::Labels => match k.as_str() {
                "subjectLabels" => {
                    let Some(patch_labels) = v.as_object() else {
                        return Err("subjectLabels must be an object".into());
                    };
                    let labels = obj
                        .entry("subjectLabels".to_string())
                        .or_insert_with(|| json!({}));
                    let Some(labels) = labels.as_object_mut() else {
                        return Err("subjectLabels must be an object".into());
                    };
                    for (subject, label) in patch_labels {
                        // null clears an override
                        if label.is_null() {
                            labels.remove(subject);
                            continue;
                        }
                        let s = parse_string_max(label, subject, 60)?;
                        if s.is_empty() {
                            return Err(format!("label for {} must not be empty", subject));
                        }
                        labels.insert(subject.clone(), Value::String(s));
                    }
                }
                _ => return Err(format!("unknown labels field: {}", k)),
            },
            Section::Students => match k.as_str() {
                "cascadeDelete" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown students field: {}", k)),
            },
            Section::Security => match k.as_str() {
                "requireSession" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown security field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: Section) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %e, "ignoring saved setup");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn update_section(
    conn: &Connection,
    section: Section,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(Ok(current))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarksConfig {
    pub enforce_maxima: bool,
    pub internal1: f64,
    pub midterm: f64,
    pub internal2: f64,
    pub final_exam: f64,
}

impl MarksConfig {
    pub fn max_for(&self, exam: ExamComponent) -> f64 {
        match exam {
            ExamComponent::Internal1 => self.internal1,
            ExamComponent::Midterm => self.midterm,
            ExamComponent::Internal2 => self.internal2,
            ExamComponent::Final => self.final_exam,
        }
    }

    /// `Some(max)` when scores for `exam` must be capped.
    pub fn limit_for(&self, exam: ExamComponent) -> Option<f64> {
        self.enforce_maxima.then(|| self.max_for(exam))
    }
}

impl Default for MarksConfig {
    fn default() -> Self {
        marks_config_from(&default_section(Section::Marks))
    }
}

fn marks_config_from(v: &Value) -> MarksConfig {
    let max = |exam: &str, fallback: f64| {
        v.get("examMaxima")
            .and_then(|m| m.get(exam))
            .and_then(|n| n.as_f64())
            .unwrap_or(fallback)
    };
    MarksConfig {
        enforce_maxima: v
            .get("enforceMaxima")
            .and_then(|b| b.as_bool())
            .unwrap_or(true),
        internal1: max("internal1", 20.0),
        midterm: max("midterm", 80.0),
        internal2: max("internal2", 20.0),
        final_exam: max("final", 80.0),
    }
}

pub fn marks_config(conn: &Connection) -> anyhow::Result<MarksConfig> {
    Ok(marks_config_from(&load_section(conn, Section::Marks)?))
}

pub fn subject_labels(conn: &Connection) -> anyhow::Result<SubjectLabels> {
    let section = load_section(conn, Section::Labels)?;
    let overrides = section
        .get("subjectLabels")
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok(SubjectLabels::with_overrides(overrides))
}

pub fn cascade_delete(conn: &Connection) -> anyhow::Result<bool> {
    Ok(load_section(conn, Section::Students)?
        .get("cascadeDelete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

pub fn require_session(conn: &Connection) -> anyhow::Result<bool> {
    Ok(load_section(conn, Section::Security)?
        .get("requireSession")
        .and_then(|v| v.as_bool())
        .unwrap_or(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    #[test]
    fn defaults_apply_without_saved_settings() {
        let s = SqliteStore::open_in_memory().expect("store");
        let m = marks_config(s.conn()).expect("marks");
        assert_eq!(m, MarksConfig::default());
        assert_eq!(m.limit_for(ExamComponent::Midterm), Some(80.0));
        assert!(!cascade_delete(s.conn()).expect("cascade"));
        assert!(require_session(s.conn()).expect("session"));
    }

    #[test]
    fn patch_merges_maxima_per_exam() {
        let s = SqliteStore::open_in_memory().expect("store");
        let patch = json!({ "examMaxima": { "final": 100 } });
        update_section(s.conn(), Section::Marks, patch.as_object().expect("obj"))
            .expect("db")
            .expect("valid");
        let m = marks_config(s.conn()).expect("marks");
        assert_eq!(m.final_exam, 100.0);
        assert_eq!(m.midterm, 80.0);
    }

    #[test]
    fn invalid_patch_is_rejected_and_not_saved() {
        let s = SqliteStore::open_in_memory().expect("store");
        let patch = json!({ "examMaxima": { "quiz": 10 } });
        let res = update_section(s.conn(), Section::Marks, patch.as_object().expect("obj"))
            .expect("db");
        assert!(res.is_err());
        let patch = json!({ "cascade": true });
        let res = update_section(s.conn(), Section::Students, patch.as_object().expect("obj"))
            .expect("db");
        assert_eq!(res, Err("unknown students field: cascade".to_string()));
        assert!(!cascade_delete(s.conn()).expect("cascade"));
    }

    #[test]
    fn label_overrides_can_be_cleared() {
        let s = SqliteStore::open_in_memory().expect("store");
        let set = json!({ "subjectLabels": { "math": "MATHS", "hindi": "HINDI" } });
        update_section(s.conn(), Section::Labels, set.as_object().expect("obj"))
            .expect("db")
            .expect("valid");
        let clear = json!({ "subjectLabels": { "math": null } });
        update_section(s.conn(), Section::Labels, clear.as_object().expect("obj"))
            .expect("db")
            .expect("valid");
        let labels = subject_labels(s.conn()).expect("labels");
        assert_eq!(labels.format("math"), "MATHEMATICS");
        assert_eq!(labels.format("hindi"), "HINDI");
    }
}
