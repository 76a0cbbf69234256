use crate::error::{AppError, AppResult};

/// Canonical roll number: every non-digit character is dropped and the rest
/// parsed as base-10. Input without digits (or too many to fit) is rejected.
pub fn normalize_roll(raw: &str) -> AppResult<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(AppError::InvalidRollFormat(raw.to_string()));
    }
    digits
        .parse::<u64>()
        .map_err(|_| AppError::RollOutOfRange(raw.to_string()))
}

/// Two-digit, zero-padded display form; absent input renders as `""`.
pub fn display_roll(n: Option<u64>) -> String {
    match n {
        Some(v) => format!("{:02}", v),
        None => String::new(),
    }
}

/// Same padding for report cells that may hold a fractional score.
pub fn pad2(v: Option<f64>) -> String {
    match v {
        None => String::new(),
        Some(f) if f.fract() == 0.0 && f >= 0.0 => format!("{:02}", f as i64),
        Some(f) => {
            let s = f.to_string();
            if s.len() < 2 {
                format!("{:0>2}", s)
            } else {
                s
            }
        }
    }
}
