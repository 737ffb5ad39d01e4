use poc_types::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const HIGH_REDUNDANCY_THRESHOLD: f64 = 0.85;
pub const MODERATE_OVERLAP_THRESHOLD: f64 = 0.65;
pub const RELATED_THRESHOLD: f64 = 0.45;

/// Severity of overlap between two submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapClass {
    ExactDuplicate,
    HighRedundancy,
    ModerateOverlap,
    Related,
    None,
}

impl OverlapClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapClass::ExactDuplicate => "exact_duplicate",
            OverlapClass::HighRedundancy => "high_redundancy",
            OverlapClass::ModerateOverlap => "moderate_overlap",
            OverlapClass::Related => "related",
            OverlapClass::None => "none",
        }
    }

    /// Whether the pair is close enough to be reported at all.
    pub fn is_overlap(&self) -> bool {
        !matches!(self, OverlapClass::None)
    }
}

impl fmt::Display for OverlapClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jaccard overlap of the normalized token sets of two texts, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    token_similarity(&tokenize(a), &tokenize(b))
}

/// Jaccard overlap of two pre-tokenized texts.
///
/// Two texts without any tokens share nothing and score 0. Their content
/// hashes still match, which is how they are caught as duplicates.
pub fn token_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|token| large.contains(*token)).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Class of a pairwise similarity score.
///
/// Never returns [`OverlapClass::ExactDuplicate`]: only a content-hash match
/// makes two records exact duplicates. Identical token sets in a different
/// order score 1 and are high redundancy.
pub fn classify(score: f64) -> OverlapClass {
    if score >= HIGH_REDUNDANCY_THRESHOLD {
        OverlapClass::HighRedundancy
    } else if score >= MODERATE_OVERLAP_THRESHOLD {
        OverlapClass::ModerateOverlap
    } else if score >= RELATED_THRESHOLD {
        OverlapClass::Related
    } else {
        OverlapClass::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_after_normalization_scores_one() {
        assert_eq!(similarity("Alpha beta, gamma", "gamma BETA alpha"), 1.0);
        assert_eq!(classify(1.0), OverlapClass::HighRedundancy);
    }

    #[test]
    fn partial_overlap() {
        // {a b c} vs {b c d}: 2 shared of 4
        assert!((similarity("a b c", "b c d") - 0.5).abs() < 1e-12);
        assert_eq!(classify(0.5), OverlapClass::Related);
    }

    #[test]
    fn empty_texts_share_nothing() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("...", "alpha"), 0.0);
    }

    #[test]
    fn class_boundaries_are_inclusive() {
        assert_eq!(classify(0.85), OverlapClass::HighRedundancy);
        assert_eq!(classify(0.849), OverlapClass::ModerateOverlap);
        assert_eq!(classify(0.65), OverlapClass::ModerateOverlap);
        assert_eq!(classify(0.45), OverlapClass::Related);
        assert_eq!(classify(0.449), OverlapClass::None);
        assert_eq!(classify(0.0), OverlapClass::None);
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric_and_bounded(
            a in "[a-e ]{0,24}",
            b in "[a-e ]{0,24}",
        ) {
            let ab = similarity(&a, &b);
            let ba = similarity(&b, &a);
            prop_assert_eq!(ab, ba);
            prop_assert!((0.0..=1.0).contains(&ab));
        }

        #[test]
        fn scores_never_classify_as_exact(score in 0.0f64..=1.0) {
            prop_assert_ne!(classify(score), OverlapClass::ExactDuplicate);
        }

        #[test]
        fn non_empty_text_is_identical_to_itself(a in "[a-z]{1,6}( [a-z]{1,6}){0,8}") {
            prop_assert_eq!(similarity(&a, &a), 1.0);
        }
    }
}
