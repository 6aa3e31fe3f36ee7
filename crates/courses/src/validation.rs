//! Shared field rules.

use std::collections::HashSet;
use std::hash::Hash;

use campus_core::{DomainError, DomainResult};

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// Trim a name and enforce the non-blank / length rules.
pub fn normalize_name(field: &str, raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be blank")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Drop repeated ids, keeping the first occurrence of each.
pub fn dedup_ids<T: Copy + Eq + Hash>(ids: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
