//! Canonical column labels.
//!
//! Lowercasing happens before the character-class strip so uppercase letters
//! survive as their lowercase forms instead of being dropped.

use std::collections::HashSet;

use crate::data::Dataset;

pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        .collect()
}

/// Rewrites every column label to canonical form. Two distinct labels can
/// normalize to the same name; the first keeps it and later colliders get a
/// numeric suffix so no column is silently dropped.
pub fn normalize_columns(mut dataset: Dataset) -> Dataset {
    let mut used: HashSet<String> = HashSet::new();
    for column in &mut dataset.columns {
        let base = normalize_name(&column.name);
        let mut candidate = base.clone();
        let mut suffix = 2usize;
        while !used.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        column.name = candidate;
    }
    dataset
}
