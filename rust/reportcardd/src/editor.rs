use crate::error::{AppError, AppResult};
use crate::model::{
    self, score_to_value, AttendanceRecord, CoScholasticRecord, ExamComponent, RawRoll, Student,
    Subject,
};
use crate::roll::normalize_roll;
use crate::roster;
use crate::store::{self, Store};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DELETE_PROMPT: &str = "Delete this student?";

fn required<'a>(value: &'a str, message: &str) -> AppResult<&'a str> {
    let t = value.trim();
    if t.is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(t)
}

/// Next roll for a class: one past the highest parseable roll, or 1.
/// Storage keys are never consulted.
pub fn next_roll(students: &[Student]) -> u64 {
    students
        .iter()
        .filter_map(|s| normalize_roll(&s.roll.as_text()).ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// A student whose roll was chosen from a roster read but not yet written.
#[derive(Debug, Clone)]
pub struct PendingStudent {
    class_key: String,
    name: String,
    roll: u64,
}

impl PendingStudent {
    #[cfg(test)]
    pub fn roll(&self) -> u64 {
        self.roll
    }
}

/// Read half of [`add_student`].
pub fn prepare_add_student(
    store: &dyn Store,
    class_key: &str,
    name: &str,
) -> AppResult<PendingStudent> {
    let class_key = required(class_key, "Select class and enter student name")?;
    let name = required(name, "Select class and enter student name")?;
    let students = roster::load_students(store, class_key)?;
    Ok(PendingStudent {
        class_key: class_key.to_string(),
        name: name.to_string(),
        roll: next_roll(&students),
    })
}

/// Write half of [`add_student`]. Nothing re-checks the roll here, so two
/// pending students prepared from the same read collide.
pub fn commit_add_student(store: &mut dyn Store, pending: PendingStudent) -> AppResult<Student> {
    let mut student = Student {
        key: String::new(),
        name: pending.name,
        roll: RawRoll::Number(pending.roll.into()),
        class_key: Some(pending.class_key.clone()),
    };
    let key = store.push(
        &store::students_path(&pending.class_key)?,
        &student.to_store_value(),
    )?;
    student.key = key;
    tracing::info!(
        class = %pending.class_key,
        key = %student.key,
        roll = pending.roll,
        "student added"
    );
    Ok(student)
}

pub fn add_student(store: &mut dyn Store, class_key: &str, name: &str) -> AppResult<Student> {
    let pending = prepare_add_student(store, class_key, name)?;
    commit_add_student(store, pending)
}

/// Lowercased display name with all whitespace removed.
pub fn subject_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn add_subject(store: &mut dyn Store, class_key: &str, name: &str) -> AppResult<Subject> {
    let class_key = required(class_key, "Select class first")?;
    let display_name = required(name, "Enter subject name")?;
    let key = subject_key(display_name);
    let path = store::subject_path(class_key, &key)?;
    if store.exists(&path)? {
        return Err(AppError::DuplicateKey(format!(
            "Subject already exists: {}",
            key
        )));
    }
    store.set(&path, &Value::String(display_name.to_string()))?;
    tracing::info!(class = %class_key, subject = %key, "subject added");
    Ok(Subject {
        key,
        display_name: display_name.to_string(),
    })
}

pub fn list_subjects(store: &dyn Store, class_key: &str) -> AppResult<Vec<Subject>> {
    let snapshot = store.get(&store::subjects_path(class_key)?)?;
    Ok(model::subjects_from_snapshot(snapshot.as_ref()))
}

/// Overwrites only `name`. A blank name is ignored and reported as `false`.
pub fn update_student_name(
    store: &mut dyn Store,
    class_key: &str,
    student_key: &str,
    new_name: &str,
) -> AppResult<bool> {
    let name = new_name.trim();
    if name.is_empty() {
        return Ok(false);
    }
    let path = store::student_path(class_key, student_key)?;
    if !store.exists(&path)? {
        return Err(AppError::NotFound("student not found".into()));
    }
    let mut fields = Map::new();
    fields.insert("name".into(), Value::String(name.to_string()));
    store.update(&path, &fields)?;
    Ok(true)
}

/// Yes/no capability used before destructive edits.
pub trait ConfirmPrompt {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> ConfirmPrompt for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted { cascaded: bool },
}

/// Removes a student record. With `cascade` the records keyed by the
/// student's current position go too; later students are not re-indexed
/// either way.
pub fn delete_student(
    store: &mut dyn Store,
    class_key: &str,
    student_key: &str,
    prompt: &mut dyn ConfirmPrompt,
    cascade: bool,
) -> AppResult<DeleteOutcome> {
    let path = store::student_path(class_key, student_key)?;
    if !store.exists(&path)? {
        return Err(AppError::NotFound("student not found".into()));
    }
    if !prompt.confirm(DELETE_PROMPT) {
        return Ok(DeleteOutcome::Declined);
    }

    let position = if cascade {
        roster::load_roster(store, class_key)?.position_of(student_key)
    } else {
        None
    };

    store.remove(&path)?;

    let Some(position) = position else {
        return Ok(DeleteOutcome::Deleted { cascaded: false });
    };
    store.remove(&store::co_scholastic_path(class_key, position)?)?;
    store.remove(&store::attendance_path(class_key, position)?)?;
    let marks = store.get(&store::class_marks_path(class_key)?)?;
    if let Some(marks) = marks {
        for (exam, subjects) in store::ordered_children(&marks) {
            for (subject, _) in store::ordered_children(subjects) {
                let p = store::marks_path(class_key, exam, subject)?.child(&position.to_string())?;
                store.remove(&p)?;
            }
        }
    }
    tracing::info!(
        class = %class_key,
        key = %student_key,
        position,
        "student deleted with dependents"
    );
    Ok(DeleteOutcome::Deleted { cascaded: true })
}

/// Existing scores for one (class, exam, subject), keyed by position.
pub fn load_marks(
    store: &dyn Store,
    class_key: &str,
    exam: ExamComponent,
    subject_key: &str,
) -> AppResult<BTreeMap<usize, f64>> {
    let snapshot = store.get(&store::marks_path(class_key, exam.key(), subject_key)?)?;
    let mut out = BTreeMap::new();
    if let Some(v) = snapshot {
        for (k, score) in store::ordered_children(&v) {
            if let (Ok(pos), Some(s)) = (k.parse::<usize>(), model::score_from_value(score)) {
                out.insert(pos, s);
            }
        }
    }
    Ok(out)
}

/// Replaces the whole score map at `marks/{class}/{exam}/{subject}`. Blank
/// entries are dropped first, so anything not sent is deleted from the store.
pub fn save_marks(
    store: &mut dyn Store,
    class_key: &str,
    exam: &str,
    subject_key: &str,
    entries: &BTreeMap<usize, Option<f64>>,
    max_score: Option<f64>,
) -> AppResult<usize> {
    if class_key.trim().is_empty() || exam.trim().is_empty() || subject_key.trim().is_empty() {
        return Err(AppError::validation("Select class, exam and subject"));
    }
    let Some(exam) = ExamComponent::parse(exam) else {
        return Err(AppError::Validation(format!("unknown exam: {}", exam)));
    };

    let mut scores = Map::new();
    for (pos, score) in entries {
        let Some(score) = score else { continue };
        let upper = max_score.unwrap_or(f64::INFINITY);
        if !score.is_finite() || *score < 0.0 || *score > upper {
            let message = match max_score {
                Some(m) => format!("Marks must be between 0 and {}", m),
                None => "Marks must not be negative".to_string(),
            };
            return Err(AppError::Validation(message));
        }
        scores.insert(pos.to_string(), score_to_value(*score));
    }
    if scores.is_empty() {
        return Err(AppError::validation("No marks entered"));
    }

    let count = scores.len();
    let path = store::marks_path(class_key.trim(), exam.key(), subject_key.trim())?;
    store.set(&path, &Value::Object(scores))?;
    tracing::info!(path = %path, count, "marks saved");
    Ok(count)
}

/// Writes both per-student sub-records at the student's position index.
pub fn save_co_scholastic_and_attendance(
    store: &mut dyn Store,
    class_key: &str,
    position: usize,
    grades: &CoScholasticRecord,
    attendance: &AttendanceRecord,
) -> AppResult<()> {
    let class_key = required(class_key, "Select class and student")?;
    let grades = serde_json::to_value(grades).map_err(anyhow::Error::from)?;
    let attendance = serde_json::to_value(attendance).map_err(anyhow::Error::from)?;
    store.set(&store::co_scholastic_path(class_key, position)?, &grades)?;
    store.set(&store::attendance_path(class_key, position)?, &attendance)?;
    Ok(())
}

pub fn load_co_scholastic_and_attendance(
    store: &dyn Store,
    class_key: &str,
    position: usize,
) -> AppResult<(CoScholasticRecord, AttendanceRecord)> {
    let cs = store.get(&store::co_scholastic_path(class_key, position)?)?;
    let at = store.get(&store::attendance_path(class_key, position)?)?;
    Ok((
        CoScholasticRecord::from_snapshot(cs.as_ref()),
        AttendanceRecord::from_snapshot(at.as_ref()),
    ))
}

/// Class keys that currently hold students.
pub fn list_classes(store: &dyn Store) -> AppResult<Vec<String>> {
    let snapshot = store.get(&store::StorePath::new(&[store::STUDENTS])?)?;
    Ok(snapshot
        .as_ref()
        .map(|v| {
            store::ordered_children(v)
                .into_iter()
                .map(|(k, _)| k.to_string())
                .collect()
        })
        .unwrap_or_default())
}
