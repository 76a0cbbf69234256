use serde::{Serialize, Serializer};
use std::fmt;

pub const SEM1_WEIGHT: f64 = 0.4;
pub const SEM2_WEIGHT: f64 = 0.6;

/// Half-away-from-zero rounding, applied to each weighted semester total
/// before the two are summed.
pub fn round_half_away(x: f64) -> i64 {
    x.round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Percentage grading: 90 A+, 80 A, 60 B, 45 C, 33 D, otherwise E.
pub fn grade_from_score(score: f64) -> Grade {
    if score >= 90.0 {
        Grade::APlus
    } else if score >= 80.0 {
        Grade::A
    } else if score >= 60.0 {
        Grade::B
    } else if score >= 45.0 {
        Grade::C
    } else if score >= 33.0 {
        Grade::D
    } else {
        Grade::E
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub internal1: f64,
    pub midterm: f64,
    pub sem1_total: f64,
    pub internal2: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
    pub sem2_total: f64,
    pub weighted40: i64,
    pub weighted60: i64,
    pub subject_total: i64,
    pub grade: Grade,
}

/// One subject's report line. Absent components count as 0.
pub fn compute_subject_row(
    internal1: Option<f64>,
    midterm: Option<f64>,
    internal2: Option<f64>,
    final_exam: Option<f64>,
) -> ReportRow {
    let i1 = internal1.unwrap_or(0.0);
    let mt = midterm.unwrap_or(0.0);
    let i2 = internal2.unwrap_or(0.0);
    let fe = final_exam.unwrap_or(0.0);

    let sem1_total = i1 + mt;
    let sem2_total = i2 + fe;
    let weighted40 = round_half_away(sem1_total * SEM1_WEIGHT);
    let weighted60 = round_half_away(sem2_total * SEM2_WEIGHT);
    let subject_total = weighted40 + weighted60;

    ReportRow {
        internal1: i1,
        midterm: mt,
        sem1_total,
        internal2: i2,
        final_exam: fe,
        sem2_total,
        weighted40,
        weighted60,
        subject_total,
        grade: grade_from_score(subject_total as f64),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overall {
    pub grand_total: i64,
    pub subject_count: usize,
    pub percentage: f64,
}

pub fn compute_overall(rows: &[ReportRow]) -> Overall {
    let grand_total: i64 = rows.iter().map(|r| r.subject_total).sum();
    let subject_count = rows.len();
    let percentage = if subject_count > 0 {
        grand_total as f64 / subject_count as f64
    } else {
        0.0
    };
    Overall {
        grand_total,
        subject_count,
        percentage,
    }
}

/// Two-decimal rendering used at the presentation boundary only.
pub fn format_percentage(p: f64) -> String {
    format!("{:.2}", p)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttendancePercentage {
    Available(f64),
    Unavailable,
}

impl fmt::Display for AttendancePercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendancePercentage::Available(p) => write!(f, "{:.2}%", p),
            AttendancePercentage::Unavailable => f.write_str("unavailable"),
        }
    }
}

impl Serialize for AttendancePercentage {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

pub fn compute_attendance_percentage(
    present: Option<u32>,
    working: Option<u32>,
) -> AttendancePercentage {
    match (present, working) {
        (Some(p), Some(w)) if w > 0 => {
            AttendancePercentage::Available(f64::from(p) / f64::from(w) * 100.0)
        }
        _ => AttendancePercentage::Unavailable,
    }
}
