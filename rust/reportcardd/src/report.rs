use crate::calc::{self, AttendancePercentage, Overall, ReportRow};
use crate::editor;
use crate::error::{AppError, AppResult};
use crate::labels::{self, SubjectLabels};
use crate::model::{self, AttendanceRecord, CoScholasticRecord, ExamComponent, MarkSheet};
use crate::roll::pad2;
use crate::roster;
use crate::store::{self, Store};
use serde::Serialize;
use std::collections::BTreeMap;

const PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardHeader {
    pub class_key: String,
    pub class_label: String,
    pub position: usize,
    pub roll: u64,
    pub display_roll: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_key: String,
    pub label: String,
    #[serde(flatten)]
    pub row: ReportRow,
    /// Which of internal1/midterm/internal2/final actually had a stored score.
    pub present: BTreeMap<&'static str, bool>,
    /// Two-digit cells in report column order, blank where no score exists.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallLine {
    #[serde(flatten)]
    pub overall: Overall,
    pub percentage_text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLine {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub sem1_percentage: AttendancePercentage,
    pub sem2_percentage: AttendancePercentage,
    pub display: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoScholasticLine {
    #[serde(flatten)]
    pub record: CoScholasticRecord,
    pub display: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCard {
    pub header: CardHeader,
    pub rows: Vec<SubjectLine>,
    pub overall: OverallLine,
    pub co_scholastic: CoScholasticLine,
    pub attendance: AttendanceLine,
}

fn subject_line(
    labels: &SubjectLabels,
    marks: &MarkSheet,
    subject_key: &str,
    position: usize,
) -> SubjectLine {
    let score = |exam| marks.score(exam, subject_key, position);
    let i1 = score(ExamComponent::Internal1);
    let mt = score(ExamComponent::Midterm);
    let i2 = score(ExamComponent::Internal2);
    let fe = score(ExamComponent::Final);
    let row = calc::compute_subject_row(i1, mt, i2, fe);

    let present = ExamComponent::ALL
        .into_iter()
        .zip([i1, mt, i2, fe])
        .map(|(c, v)| (c.key(), v.is_some()))
        .collect();
    let cells = vec![
        pad2(i1),
        pad2(mt),
        pad2(Some(row.sem1_total)),
        pad2(i2),
        pad2(fe),
        pad2(Some(row.sem2_total)),
        pad2(Some(row.weighted40 as f64)),
        pad2(Some(row.weighted60 as f64)),
        pad2(Some(row.subject_total as f64)),
        row.grade.to_string(),
    ];

    SubjectLine {
        subject_key: subject_key.to_string(),
        label: labels.format(subject_key),
        row,
        present,
        cells,
    }
}

fn or_placeholder(s: &str) -> String {
    if s.trim().is_empty() {
        PLACEHOLDER.to_string()
    } else {
        s.to_string()
    }
}

fn co_scholastic_line(record: CoScholasticRecord) -> CoScholasticLine {
    let display = record
        .fields()
        .into_iter()
        .map(|(k, v)| (k, or_placeholder(v)))
        .collect();
    CoScholasticLine { record, display }
}

fn attendance_line(record: AttendanceRecord) -> AttendanceLine {
    let count = |v: Option<u32>| match v {
        Some(n) => n.to_string(),
        None => PLACEHOLDER.to_string(),
    };
    let mut display = BTreeMap::new();
    display.insert("sem1_working", count(record.sem1_working));
    display.insert("sem1_present", count(record.sem1_present));
    display.insert("sem2_working", count(record.sem2_working));
    display.insert("sem2_present", count(record.sem2_present));
    AttendanceLine {
        sem1_percentage: calc::compute_attendance_percentage(
            record.sem1_present,
            record.sem1_working,
        ),
        sem2_percentage: calc::compute_attendance_percentage(
            record.sem2_present,
            record.sem2_working,
        ),
        record,
        display,
    }
}

/// Assembles the report card for the student at `position` in roll order.
/// Subjects and marks are both fetched before either is combined.
pub fn load_student_card(
    store: &dyn Store,
    class_key: &str,
    position: usize,
    labels: &SubjectLabels,
) -> AppResult<StudentCard> {
    let roster = roster::load_roster(store, class_key)?;
    if roster.is_empty() {
        return Err(AppError::NotFound(format!("no students in {}", class_key)));
    }
    let Some(entry) = roster.get(position) else {
        return Err(AppError::NotFound(format!(
            "no student at position {} in {}",
            position, class_key
        )));
    };

    let subjects_snap = store.get(&store::subjects_path(class_key)?)?;
    let marks_snap = store.get(&store::class_marks_path(class_key)?)?;
    let subjects = model::subjects_from_snapshot(subjects_snap.as_ref());
    let marks = MarkSheet::from_snapshot(marks_snap);

    let rows: Vec<SubjectLine> = subjects
        .iter()
        .map(|s| subject_line(labels, &marks, &s.key, position))
        .collect();
    let plain_rows: Vec<ReportRow> = rows.iter().map(|l| l.row).collect();
    let overall = calc::compute_overall(&plain_rows);

    let (cs, att) = editor::load_co_scholastic_and_attendance(store, class_key, position)?;

    Ok(StudentCard {
        header: CardHeader {
            class_key: class_key.to_string(),
            class_label: labels::format_class_label(class_key),
            position,
            roll: entry.roll,
            display_roll: entry.display_roll.clone(),
            name: entry.name.to_uppercase(),
        },
        rows,
        overall: OverallLine {
            percentage_text: calc::format_percentage(overall.percentage),
            overall,
        },
        co_scholastic: co_scholastic_line(cs),
        attendance: attendance_line(att),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::Grade;
    use crate::db::SqliteStore;
    use crate::store::StorePath;
    use serde_json::json;

    fn seeded() -> SqliteStore {
        let mut s = SqliteStore::open_in_memory().expect("store");
        s.set(
            &StorePath::new(&["students", "class1"]).expect("path"),
            &json!({
                "kb": { "name": "Bina", "roll": 2 },
                "ka": { "name": "Asha", "roll": 1 }
            }),
        )
        .expect("students");
        s.set(
            &StorePath::new(&["subjects", "class1"]).expect("path"),
            &json!({ "math": "Math", "english": "English" }),
        )
        .expect("subjects");
        s
    }

    #[test]
    fn mark_at_position_zero_belongs_to_lowest_roll() {
        let mut s = seeded();
        s.set(
            &StorePath::new(&["marks", "class1", "final", "math", "0"]).expect("path"),
            &json!(70),
        )
        .expect("mark");

        let card = load_student_card(&s, "class1", 0, &SubjectLabels::default()).expect("card");
        assert_eq!(card.header.name, "ASHA");
        assert_eq!(card.header.display_roll, "01");
        assert_eq!(card.header.class_label, "Class I");

        let math = card
            .rows
            .iter()
            .find(|r| r.subject_key == "math")
            .expect("math row");
        assert_eq!(math.label, "MATHEMATICS");
        assert_eq!(math.row.final_exam, 70.0);
        assert_eq!(math.row.weighted60, 42);
        assert_eq!(math.row.subject_total, 42);
        assert_eq!(math.present.get("final"), Some(&true));
        assert_eq!(math.present.get("midterm"), Some(&false));
        assert_eq!(math.cells[0], "");
        assert_eq!(math.cells[4], "70");

        let other = load_student_card(&s, "class1", 1, &SubjectLabels::default()).expect("card");
        assert_eq!(other.header.name, "BINA");
        assert!(other.rows.iter().all(|r| r.row.subject_total == 0));
    }

    #[test]
    fn overall_and_extras() {
        let mut s = seeded();
        let full_marks = [("internal1", 20), ("midterm", 80), ("internal2", 20), ("final", 80)];
        for (exam, score) in full_marks {
            s.set(
                &StorePath::new(&["marks", "class1", exam, "english"]).expect("path"),
                &json!({ "0": score }),
            )
            .expect("mark");
        }
        editor::save_co_scholastic_and_attendance(
            &mut s,
            "class1",
            0,
            &CoScholasticRecord {
                discipline: "A".into(),
                ..Default::default()
            },
            &AttendanceRecord {
                sem1_working: Some(20),
                sem1_present: Some(18),
                ..Default::default()
            },
        )
        .expect("extras");

        let card = load_student_card(&s, "class1", 0, &SubjectLabels::default()).expect("card");
        assert_eq!(card.rows.len(), 2);
        let english = card
            .rows
            .iter()
            .find(|r| r.subject_key == "english")
            .expect("english");
        assert_eq!(english.row.subject_total, 100);
        assert_eq!(english.row.grade, Grade::APlus);
        assert_eq!(card.overall.overall.grand_total, 100);
        assert_eq!(card.overall.overall.subject_count, 2);
        assert_eq!(card.overall.percentage_text, "50.00");

        assert_eq!(card.co_scholastic.display.get("discipline").map(String::as_str), Some("A"));
        assert_eq!(card.co_scholastic.display.get("supw").map(String::as_str), Some(PLACEHOLDER));
        assert_eq!(card.attendance.sem1_percentage.to_string(), "90.00%");
        assert_eq!(card.attendance.sem2_percentage.to_string(), "unavailable");
        assert_eq!(
            card.attendance.display.get("sem2_working").map(String::as_str),
            Some(PLACEHOLDER)
        );
    }

    #[test]
    fn zero_attendance_is_shown_not_blanked() {
        let line = attendance_line(AttendanceRecord {
            sem1_working: Some(20),
            sem1_present: Some(0),
            ..Default::default()
        });
        assert_eq!(line.display.get("sem1_present").map(String::as_str), Some("0"));
        assert_eq!(line.display.get("sem2_present").map(String::as_str), Some(PLACEHOLDER));
        assert_eq!(line.sem1_percentage.to_string(), "0.00%");
    }

    #[test]
    fn class_without_subjects_reports_zero_overall() {
        let mut s = seeded();
        s.remove(&StorePath::new(&["subjects", "class1"]).expect("path"))
            .expect("remove");
        let card = load_student_card(&s, "class1", 0, &SubjectLabels::default()).expect("card");
        assert!(card.rows.is_empty());
        assert_eq!(card.overall.percentage_text, "0.00");
    }

    #[test]
    fn out_of_range_position_is_not_found() {
        let s = seeded();
        assert!(matches!(
            load_student_card(&s, "class1", 5, &SubjectLabels::default()),
            Err(AppError::NotFound(_))
        ));
    }
}
