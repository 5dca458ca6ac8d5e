//! Term reduction for search seeding.
//!
//! Downstream fuzzy matching builds one pattern per entity from its name
//! variants. If an entity matches both "Al Qaeda" and "Al Qaeda in Iraq,
//! Syria and the Levant", searching for the latter is useless: the shorter
//! term already matches every occurrence. The reduction here keeps only the
//! minimal covering subset of normalized terms.

use std::collections::BTreeSet;

use regex::Regex;

use crate::text::match_form;

/// Normalized terms shorter than this are dropped (false-positive risk).
pub const MIN_TERM_LENGTH: usize = 4;

/// Normalized terms longer than this are dropped (pathological regex cost).
pub const MAX_TERM_LENGTH: usize = 120;

/// Reduce a set of raw terms to the minimal covering subset.
///
/// Every term is normalized with [`match_form`]; candidates outside the
/// `[MIN_TERM_LENGTH, MAX_TERM_LENGTH]` length band are skipped, and a
/// candidate is discarded when any other normalized term is a substring of
/// it. Quadratic in the number of terms, which is acceptable for per-entity
/// alias counts (tens, not thousands).
#[must_use]
pub fn reduce_terms(terms: &BTreeSet<String>) -> BTreeSet<String> {
    let normalized: BTreeSet<String> = terms.iter().filter_map(|t| match_form(t)).collect();

    let mut reduced = BTreeSet::new();
    for term in &normalized {
        let length = term.chars().count();
        if !(MIN_TERM_LENGTH..=MAX_TERM_LENGTH).contains(&length) {
            continue;
        }
        let contained = normalized
            .iter()
            .any(|other| other != term && term.contains(other.as_str()));
        if !contained {
            reduced.insert(term.clone());
        }
    }
    reduced
}

/// Build one case-insensitive, word-bounded alternation over a set of
/// reduced terms.
///
/// Terms are escaped, so the output is safe for arbitrary name content.
/// Returns `None` for an empty set.
#[must_use]
pub fn term_regex(terms: &BTreeSet<String>) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)\b(?:{alternation})\b");
    // Escaped fixed-string alternations always compile.
    Regex::new(&pattern).ok()
}
