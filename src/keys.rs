//! Label normalization and approximate key lookup.
//!
//! Pure functions, no async. Extracted field labels are matched against the
//! canonical keys seen so far using Levenshtein distance relative to the
//! longer of the two labels.

use std::sync::LazyLock;

use regex::Regex;

/// A candidate only matches when it differs by less than this share of the
/// longer label's length.
pub const MAX_DISTANCE_RATIO: f64 = 0.2;

/// Numeric ordinals like `"1. "`, `"12"` or `"3."`, anywhere in the label.
static ORDINAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\s?").expect("valid ordinal regex"));

/// Best candidate found by [`closest_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMatch<'a> {
    /// The candidate as it was passed in, not its normalized form.
    pub key: &'a str,
    pub distance: usize,
}

/// Strip numeric ordinal runs and surrounding whitespace from a label.
///
/// `"1. Name"` becomes `"Name"`, `"12Address"` becomes `"Address"`.
/// Idempotent: the output contains no digits and no outer whitespace.
pub fn normalize(label: &str) -> String {
    ORDINAL_RUN.replace_all(label, "").trim().to_string()
}

/// Levenshtein distance counted in `char`s.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single rolling row over `b`
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}

/// Whether `distance` is close enough for labels whose longer length is `max_len`.
fn within_threshold(distance: usize, max_len: usize) -> bool {
    if max_len == 0 {
        return false;
    }
    distance < max_len && (distance as f64 / max_len as f64) < MAX_DISTANCE_RATIO
}

/// Find the canonical key nearest to `label`, if any is within the threshold.
///
/// Both sides are normalized before comparing. Only a strictly smaller
/// distance replaces the current best, so ties go to the earliest candidate.
pub fn closest_key<'a, I>(label: &str, canonical_keys: I) -> Option<KeyMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let input = normalize(label);
    let input_len = input.chars().count();
    let mut best: Option<KeyMatch<'a>> = None;

    for key in canonical_keys {
        let candidate = normalize(key);
        let distance = edit_distance(&input, &candidate);
        let max_len = input_len.max(candidate.chars().count());

        let improves = best.map_or(true, |b| distance < b.distance);
        if improves && within_threshold(distance, max_len) {
            best = Some(KeyMatch { key, distance });
        }
    }

    best
}

/// Resolve `label` to an existing canonical key, or `None` if it is new.
pub fn resolve<'a, I>(label: &str, canonical_keys: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    closest_key(label, canonical_keys).map(|m| m.key)
}
