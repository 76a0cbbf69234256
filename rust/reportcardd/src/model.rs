//! Records as they live in the document store.
//!
//! Snapshots are loosely shaped (older clients wrote numbers as strings, some
//! fields may be missing), so every record here decodes with one default
//! policy: missing or unreadable text becomes `""`, missing or unreadable
//! counts and scores become absent.

use crate::store;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// A roll value exactly as stored: a number or free text such as `"roll_07"`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRoll {
    Missing,
    Number(serde_json::Number),
    Text(String),
}

impl RawRoll {
    pub fn from_value(v: Option<&Value>) -> Self {
        match v {
            Some(Value::Number(n)) => RawRoll::Number(n.clone()),
            Some(Value::String(s)) => RawRoll::Text(s.clone()),
            _ => RawRoll::Missing,
        }
    }

    /// The textual form the normalizer strips digits from.
    pub fn as_text(&self) -> String {
        match self {
            RawRoll::Missing => String::new(),
            RawRoll::Text(s) => s.clone(),
            RawRoll::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                        Some(f) => f.to_string(),
                        None => String::new(),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub key: String,
    pub name: String,
    pub roll: RawRoll,
    pub class_key: Option<String>,
}

impl Student {
    pub fn from_snapshot(key: &str, v: &Value) -> Self {
        Student {
            key: key.to_string(),
            name: text_field(v, "name"),
            roll: RawRoll::from_value(v.get("roll")),
            class_key: v
                .get("class")
                .and_then(|c| c.as_str())
                .map(|c| c.to_string()),
        }
    }

    /// Stored shape: `{ name, roll, class }`. The position index is never stored.
    pub fn to_store_value(&self) -> Value {
        let roll = match &self.roll {
            RawRoll::Missing => Value::Null,
            RawRoll::Number(n) => Value::Number(n.clone()),
            RawRoll::Text(s) => Value::String(s.clone()),
        };
        let mut v = json!({ "name": self.name, "roll": roll });
        if let Some(c) = &self.class_key {
            v["class"] = Value::String(c.clone());
        }
        v
    }
}

/// Students of one class in store enumeration order.
pub fn students_from_snapshot(snapshot: Option<&Value>) -> Vec<Student> {
    let Some(v) = snapshot else {
        return Vec::new();
    };
    store::ordered_children(v)
        .into_iter()
        .map(|(k, s)| Student::from_snapshot(k, s))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub key: String,
    pub display_name: String,
}

pub fn subjects_from_snapshot(snapshot: Option<&Value>) -> Vec<Subject> {
    let Some(v) = snapshot else {
        return Vec::new();
    };
    store::ordered_children(v)
        .into_iter()
        .map(|(k, name)| Subject {
            key: k.to_string(),
            display_name: name
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| k.to_string()),
        })
        .collect()
}

/// The four scored components of a subject, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExamComponent {
    Internal1,
    Midterm,
    Internal2,
    Final,
}

impl ExamComponent {
    pub const ALL: [ExamComponent; 4] = [
        ExamComponent::Internal1,
        ExamComponent::Midterm,
        ExamComponent::Internal2,
        ExamComponent::Final,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ExamComponent::Internal1 => "internal1",
            ExamComponent::Midterm => "midterm",
            ExamComponent::Internal2 => "internal2",
            ExamComponent::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == s.trim())
    }
}

/// Reads a score leniently: numbers as-is, numeric strings parsed, anything
/// else (including `""`) is absent.
pub fn score_from_value(v: &Value) -> Option<f64> {
    let score = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    score.filter(|f| f.is_finite())
}

/// Scores are written as integers when they have no fractional part.
pub fn score_to_value(score: f64) -> Value {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        Value::from(score as i64)
    } else {
        Value::from(score)
    }
}

/// Whole-class marks snapshot: `exam -> subject -> position -> score`.
#[derive(Debug, Clone, Default)]
pub struct MarkSheet {
    root: Option<Value>,
}

impl MarkSheet {
    pub fn from_snapshot(snapshot: Option<Value>) -> Self {
        MarkSheet { root: snapshot }
    }

    pub fn score(&self, exam: ExamComponent, subject_key: &str, position: usize) -> Option<f64> {
        self.root
            .as_ref()?
            .get(exam.key())?
            .get(subject_key)?
            .get(position.to_string())
            .and_then(score_from_value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoScholasticRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub confidence: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub uniform: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub discipline: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub spoken_english: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub punctuality: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub supw: String,
}

impl CoScholasticRecord {
    pub fn from_snapshot(v: Option<&Value>) -> Self {
        v.and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("confidence", self.confidence.as_str()),
            ("uniform", self.uniform.as_str()),
            ("discipline", self.discipline.as_str()),
            ("spoken_english", self.spoken_english.as_str()),
            ("punctuality", self.punctuality.as_str()),
            ("supw", self.supw.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "lenient_count", serialize_with = "count_or_blank")]
    pub sem1_working: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count", serialize_with = "count_or_blank")]
    pub sem1_present: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count", serialize_with = "count_or_blank")]
    pub sem2_working: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count", serialize_with = "count_or_blank")]
    pub sem2_present: Option<u32>,
}

impl AttendanceRecord {
    pub fn from_snapshot(v: Option<&Value>) -> Self {
        v.and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

fn text_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub fn count_from_value(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|u| u32::try_from(u).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(count_from_value(&v))
}

fn count_or_blank<S: Serializer>(v: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(n) => s.serialize_u32(*n),
        None => s.serialize_str(""),
    }
}
