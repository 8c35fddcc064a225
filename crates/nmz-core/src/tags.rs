use std::collections::HashSet;

/// Union of `existing` and `suggested`.
///
/// Existing tags keep their order, new tags follow in suggestion order.
/// Matching is exact (case-sensitive) after trimming; blank tags are dropped.
pub fn merge_tags<S, T>(existing: &[S], suggested: &[T]) -> Vec<String>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut seen = HashSet::new();
    existing
        .iter()
        .map(AsRef::as_ref)
        .chain(suggested.iter().map(AsRef::as_ref))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(ToString::to_string)
        .collect()
}
