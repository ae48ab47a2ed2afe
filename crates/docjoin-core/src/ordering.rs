//! Ordering resolution
//!
//! The caller decides which input goes first. Whatever form the choice
//! arrives in (a list of names from a drag-and-drop list, or a textual index
//! list such as `2,1,3`), it must be a permutation of the input names.

use std::collections::{BTreeSet, HashSet};

use crate::error::{DocJoinError, OrderingViolation};

/// Validate `requested` against `names` and return the processing order.
///
/// With no requested ordering the names are sorted lexicographically.
pub fn resolve_ordering<S: AsRef<str>>(
    names: &[S],
    requested: Option<&[String]>,
) -> Result<Vec<String>, DocJoinError> {
    let mut available = BTreeSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        let name = name.as_ref();
        if !available.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }

    // Two uploads with one name can never be ordered unambiguously.
    if !duplicates.is_empty() {
        return Err(DocJoinError::InvalidOrdering(OrderingViolation {
            duplicates,
            expected: available.len(),
            actual: names.len(),
            ..Default::default()
        }));
    }

    let Some(requested) = requested else {
        return Ok(available.into_iter().map(str::to_string).collect());
    };

    let mut violation = OrderingViolation {
        expected: available.len(),
        actual: requested.len(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    for entry in requested {
        if !available.contains(entry.as_str()) {
            if !violation.unknown.contains(entry) {
                violation.unknown.push(entry.clone());
            }
        } else if !seen.insert(entry.as_str()) && !violation.duplicates.contains(entry) {
            violation.duplicates.push(entry.clone());
        }
    }
    violation.missing = available
        .iter()
        .filter(|name| !seen.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if violation.is_empty() {
        Ok(requested.to_vec())
    } else {
        Err(DocJoinError::InvalidOrdering(violation))
    }
}

/// Translate a 1-based index list such as `"2,1,3"` into names, using the
/// upload order of `names`. The result still has to go through
/// [`resolve_ordering`].
pub fn parse_index_ordering<S: AsRef<str>>(
    text: &str,
    names: &[S],
) -> Result<Vec<String>, DocJoinError> {
    let mut ordering = Vec::new();
    let mut unknown = Vec::new();

    for token in text.split(',') {
        let token = token.trim();
        match token.parse::<usize>() {
            Ok(index) if index >= 1 && index <= names.len() => {
                ordering.push(names[index - 1].as_ref().to_string());
            }
            _ => unknown.push(token.to_string()),
        }
    }

    if unknown.is_empty() {
        Ok(ordering)
    } else {
        Err(DocJoinError::InvalidOrdering(OrderingViolation {
            unknown,
            expected: names.len(),
            actual: ordering.len(),
            ..Default::default()
        }))
    }
}
