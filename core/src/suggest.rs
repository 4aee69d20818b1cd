//! "Did you mean" suggestions for unmatched tokens.

use serde::Serialize;

/// Largest edit distance surfaced as a suggestion unless configured otherwise.
pub const DEFAULT_SUGGESTION_THRESHOLD: usize = 2;

/// Classic Levenshtein edit distance; insertions, deletions and
/// substitutions each cost 1.
///
/// # Examples
///
/// ```
/// use cmdpipe_core::edit_distance;
///
/// assert_eq!(edit_distance("ant", "aunt"), 1);
/// assert_eq!(edit_distance("fast", "cats"), 3);
/// assert_eq!(edit_distance("kitten", "sitting"), 3);
/// ```
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Candidate name as displayed.
    pub name: String,
    /// Edit distance from the unmatched token.
    pub distance: usize,
}

/// Ranks `candidates` by edit distance from `input`.
///
/// Only candidates within `threshold` are returned, closest first; ties keep
/// the order in which candidates were given (declaration order).
///
/// # Examples
///
/// ```
/// use cmdpipe_core::suggest;
///
/// let found = suggest("stauts", ["status", "stash", "start"], 2);
/// assert_eq!(found[0].name, "status");
///
/// assert!(suggest("deploy", ["status", "stash"], 2).is_empty());
/// ```
pub fn suggest<'a, I>(input: &str, candidates: I, threshold: usize) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ranked: Vec<Suggestion> = candidates
        .into_iter()
        .map(|name| Suggestion {
            name: name.to_string(),
            distance: edit_distance(input, name),
        })
        .filter(|s| s.distance <= threshold)
        .collect();
    // sort_by_key is stable, so ties stay in declaration order
    ranked.sort_by_key(|s| s.distance);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_known_values() {
        assert_eq!(edit_distance("ant", "aunt"), 1);
        assert_eq!(edit_distance("fast", "cats"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let found = suggest("bat", ["cat", "hat", "rat"], 2);
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cat", "hat", "rat"]);
    }

    #[test]
    fn test_closer_candidates_rank_first() {
        let found = suggest("lst", ["lists", "list"], 2);
        assert_eq!(found[0].name, "list");
        assert_eq!(found[0].distance, 1);
        assert_eq!(found[1].name, "lists");
    }

    #[test]
    fn test_threshold_filters_everything() {
        assert!(suggest("migrate", ["up", "down"], 2).is_empty());
    }
}
