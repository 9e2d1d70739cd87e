//! Jaccard similarity over tag sets, with whitespace-tokenized content
//! overlap as a secondary signal (§4.4.1).

use std::collections::HashSet;

use crate::types::EpisodicTrace;

const TAG_OVERLAP_THRESHOLD: f64 = 0.3;
const CONTENT_OVERLAP_THRESHOLD: f64 = 0.4;

/// Jaccard index of two string sets: `|A ∩ B| / |A ∪ B|`.
#[must_use]
pub fn jaccard_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn tokenize(content: &str) -> HashSet<String> {
    content.split_whitespace().map(str::to_lowercase).collect()
}

/// Whether two traces belong in the same cluster: tag overlap above
/// threshold, or (failing that) content-token overlap above its own
/// threshold.
#[must_use]
pub fn traces_overlap(a: &EpisodicTrace, b: &EpisodicTrace) -> bool {
    let tag_a: HashSet<String> = a.thought.tags.iter().cloned().collect();
    let tag_b: HashSet<String> = b.thought.tags.iter().cloned().collect();

    if !tag_a.is_empty() && !tag_b.is_empty() && jaccard_overlap(&tag_a, &tag_b) >= TAG_OVERLAP_THRESHOLD {
        return true;
    }

    let content_a = tokenize(&a.thought.content);
    let content_b = tokenize(&b.thought.content);
    jaccard_overlap(&content_a, &content_b) >= CONTENT_OVERLAP_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sets_have_jaccard_one() {
        let a: HashSet<String> = ["x".to_string(), "y".to_string()].into_iter().collect();
        assert!((jaccard_overlap(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_sets_have_jaccard_zero() {
        let a: HashSet<String> = ["x".to_string()].into_iter().collect();
        let b: HashSet<String> = ["y".to_string()].into_iter().collect();
        assert_eq!(jaccard_overlap(&a, &b), 0.0);
    }

    #[test]
    fn empty_sets_are_not_overlapping() {
        let a: HashSet<String> = HashSet::new();
        assert_eq!(jaccard_overlap(&a, &a), 0.0);
    }
}
