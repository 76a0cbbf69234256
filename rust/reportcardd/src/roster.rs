use crate::error::AppResult;
use crate::model::{self, Student};
use crate::roll::{display_roll, normalize_roll};
use crate::store::{self, Store};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Zero-based rank in roll order. Co-scholastic, attendance, and marks
    /// records are keyed by this value, not by `key`.
    pub position: usize,
    pub key: String,
    pub roll: u64,
    pub display_roll: String,
    pub name: String,
}

/// A student left out of the ordering because their roll does not normalize.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedStudent {
    pub key: String,
    pub name: String,
    pub raw_roll: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
    pub excluded: Vec<ExcludedStudent>,
}

impl Roster {
    pub fn get(&self, position: usize) -> Option<&RosterEntry> {
        self.entries.get(position)
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    /// Storage key -> position index. Recomputed on every load, never stored.
    pub fn positions(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .map(|e| (e.key.clone(), e.position))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Orders students by normalized roll. The sort is stable, so equal rolls
/// keep their input order.
pub fn order_roster(students: Vec<Student>) -> Roster {
    let mut ranked: Vec<(u64, Student)> = Vec::with_capacity(students.len());
    let mut excluded = Vec::new();

    for s in students {
        let raw = s.roll.as_text();
        match normalize_roll(&raw) {
            Ok(roll) => ranked.push((roll, s)),
            Err(e) => {
                tracing::warn!(key = %s.key, raw_roll = %raw, "student excluded from roster");
                excluded.push(ExcludedStudent {
                    key: s.key,
                    name: s.name,
                    raw_roll: raw,
                    reason: e.to_string(),
                });
            }
        }
    }

    ranked.sort_by_key(|(roll, _)| *roll);

    let entries = ranked
        .into_iter()
        .enumerate()
        .map(|(position, (roll, s))| RosterEntry {
            position,
            key: s.key,
            roll,
            display_roll: display_roll(Some(roll)),
            name: s.name,
        })
        .collect();

    Roster { entries, excluded }
}

pub fn load_students(store: &dyn Store, class_key: &str) -> AppResult<Vec<Student>> {
    let snapshot = store.get(&store::students_path(class_key)?)?;
    Ok(model::students_from_snapshot(snapshot.as_ref()))
}

pub fn load_roster(store: &dyn Store, class_key: &str) -> AppResult<Roster> {
    Ok(order_roster(load_students(store, class_key)?))
}
