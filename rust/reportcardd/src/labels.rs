use std::collections::BTreeMap;

const BUILTIN_SUBJECT_LABELS: [(&str, &str); 8] = [
    ("gk", "GK"),
    ("assamese", "ASSAMESE"),
    ("english", "ENGLISH"),
    ("computerscience", "COMPUTER SCIENCE"),
    ("socialstudies", "SOCIAL STUDIES"),
    ("evs", "EVS"),
    ("math", "MATHEMATICS"),
    ("maths", "MATHEMATICS"),
];

const ROMAN: [&str; 12] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

/// Subject key -> report label lookup. Configured entries override the
/// built-in table; misses fall back to [`fallback_subject_label`].
#[derive(Debug, Clone)]
pub struct SubjectLabels {
    table: BTreeMap<String, String>,
}

impl Default for SubjectLabels {
    fn default() -> Self {
        SubjectLabels {
            table: BUILTIN_SUBJECT_LABELS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl SubjectLabels {
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut labels = Self::default();
        for (k, v) in overrides {
            labels.table.insert(k, v);
        }
        labels
    }

    pub fn format(&self, key: &str) -> String {
        match self.table.get(key) {
            Some(label) => label.clone(),
            None => fallback_subject_label(key),
        }
    }
}

/// `social_studies` and `socialStudies` both become `SOCIAL STUDIES`.
pub fn fallback_subject_label(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if prev_lower && c.is_uppercase() {
            out.push(' ');
        }
        prev_lower = c.is_lowercase();
        out.push(c);
    }
    out.to_uppercase()
}

pub fn format_class_label(key: &str) -> String {
    let lower = key.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("class") {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return match rest.parse::<usize>() {
                Ok(n) if (1..=ROMAN.len()).contains(&n) => format!("Class {}", ROMAN[n - 1]),
                _ => format!("Class {}", rest),
            };
        }
    }
    if lower == "playgroup" {
        return "Play Group".to_string();
    }
    if let Some(rest) = lower.strip_prefix("nursery") {
        return with_section("Nursery", rest);
    }
    if let Some(rest) = lower.strip_prefix("lkg") {
        return with_section("LKG", rest);
    }
    if let Some(rest) = lower.strip_prefix("ukg") {
        return with_section("UKG", rest);
    }
    key.to_uppercase()
}

/// `nursery_a` / `nursery-a` / `nurserya` -> `Nursery A`.
fn with_section(level: &str, rest: &str) -> String {
    let section = rest.trim_matches(|c: char| c == '_' || c == '-' || c == ' ');
    if section.is_empty() {
        level.to_string()
    } else {
        format!("{} {}", level, section.to_uppercase())
    }
}
