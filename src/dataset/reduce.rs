//! Shrinks a dataset to its highest-priority records, keeping the record
//! array and the vector index aligned.

use rand::Rng;
use serde_json::Value;

use crate::search::flat::FlatIndex;

/// Voltage classes, highest first. Only the first match counts.
const VOLTAGE_TERMS: &[&str] = &["765kv", "500kv", "345kv", "230kv", "138kv", "115kv"];
const STATUS_TERMS: &[&str] = &["in service", "operating"];
const LENGTH_TERMS: &[&str] = &["mile", "km"];
const INFRASTRUCTURE_TERMS: &[&str] = &["interstate", "transmission", "substation"];
const MAJOR_UTILITIES: &[&str] = &["pge", "duke", "southern", "firstenergy", "exelon", "dominion"];
/// Upper bound (inclusive) of the random jitter added to every score
const MAX_JITTER: u32 = 10;

/// Result of a reduction.
#[derive(Debug)]
pub struct Reduction {
    /// Selected records in priority order
    pub records: Vec<Value>,
    /// Index rebuilt from the selected records' vectors, when one was given
    pub index: Option<FlatIndex>,
    /// Selected records dropped because the index had no vector for them
    pub dropped_without_vector: usize,
}

/// Number of records kept for `len` records at `factor`.
pub fn target_size(len: usize, factor: f64) -> usize {
    (len as f64 * factor).floor() as usize
}

/// Priority of a record based on its text, plus random jitter so that
/// equally scored records do not cluster by input order.
pub fn priority_score<R: Rng>(content: &str, rng: &mut R) -> u32 {
    base_priority(content) + rng.gen_range(0..=MAX_JITTER)
}

/// The deterministic part of [`priority_score`].
pub fn base_priority(content: &str) -> u32 {
    let content = content.to_lowercase();
    let mut score = 0;

    if content.contains("kv") {
        if let Some(i) = VOLTAGE_TERMS.iter().position(|t| content.contains(t)) {
            score += (VOLTAGE_TERMS.len() - i) as u32 * 100;
        }
    }
    if STATUS_TERMS.iter().any(|t| content.contains(t)) {
        score += 50;
    }
    if LENGTH_TERMS.iter().any(|t| content.contains(t)) {
        score += 30;
    }
    if INFRASTRUCTURE_TERMS.iter().any(|t| content.contains(t)) {
        score += 25;
    }
    if MAJOR_UTILITIES.iter().any(|t| content.contains(t)) {
        score += 20;
    }
    score
}

/// Keep the `target_size(records.len(), factor)` highest scoring records.
/// Ties keep input order. When `index` is given, a new index with the same
/// dimension and metric is built from the selected positions; selected
/// records the index has no vector for are dropped so both stay aligned.
pub fn reduce<R: Rng>(
    records: Vec<Value>,
    index: Option<&FlatIndex>,
    factor: f64,
    rng: &mut R,
) -> anyhow::Result<Reduction> {
    if !(factor > 0.0 && factor <= 1.0) {
        anyhow::bail!("Reduction factor must be in (0, 1], got {factor}");
    }

    let target = target_size(records.len(), factor);

    // Scores are drawn in input order so a fixed seed gives a fixed selection
    let mut scored: Vec<(u32, usize)> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let content = record.get("content").and_then(Value::as_str).unwrap_or("");
            (priority_score(content, rng), i)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(target);

    let mut slots: Vec<Option<Value>> = records.into_iter().map(Some).collect();
    let mut selected = Vec::with_capacity(scored.len());
    let mut dropped_without_vector = 0;

    let rebuilt = match index {
        Some(source) => {
            let mut rebuilt = FlatIndex::new(source.dim(), source.metric());
            for &(_, position) in &scored {
                match source.reconstruct(position) {
                    Some(vector) => {
                        rebuilt.add(vector)?;
                        selected.extend(slots[position].take());
                    }
                    None => dropped_without_vector += 1,
                }
            }
            Some(rebuilt)
        }
        None => {
            for &(_, position) in &scored {
                selected.extend(slots[position].take());
            }
            None
        }
    };

    Ok(Reduction {
        records: selected,
        index: rebuilt,
        dropped_without_vector,
    })
}
