use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowercase alphanumeric tokens in document order.
fn token_iter(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

/// Canonical form used for content hashing: lowercase tokens joined by a
/// single space. Punctuation and whitespace runs do not affect the hash.
pub fn normalize_text(text: &str) -> String {
    token_iter(text).collect::<Vec<_>>().join(" ")
}

/// Distinct lowercase tokens, the unit of similarity comparison.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    token_iter(text).collect()
}

/// BLAKE3 digest (hex) of the normalized text of a contribution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn of_text(text: &str) -> Self {
        let normalized = normalize_text(text);
        Self(blake3::hash(normalized.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..12).unwrap_or(&self.0);
        f.write_str(short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_punctuation_and_spacing() {
        assert_eq!(normalize_text("  Alpha,   BETA\tgamma! "), "alpha beta gamma");
        assert_eq!(
            ContentHash::of_text("Alpha beta gamma"),
            ContentHash::of_text("alpha,  beta\n gamma.")
        );
    }

    #[test]
    fn word_order_changes_the_hash() {
        assert_ne!(
            ContentHash::of_text("alpha beta"),
            ContentHash::of_text("beta alpha")
        );
    }

    #[test]
    fn tokenize_collapses_repeats() {
        let tokens = tokenize("the cat and THE hat");
        assert_eq!(tokens.len(), 4);
        assert!(tokens.contains("the"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalization_is_idempotent(text in "[A-Za-z0-9 ,.!\t\n]{0,40}") {
                let once = normalize_text(&text);
                prop_assert_eq!(normalize_text(&once), once.clone());
                prop_assert_eq!(tokenize(&once), tokenize(&text));
            }

            #[test]
            fn hash_ignores_case_and_padding(text in "[a-z]{1,8}( [a-z]{1,8}){0,6}") {
                let noisy = format!("  {}\t!", text.to_uppercase().replace(' ', " ,  "));
                prop_assert_eq!(ContentHash::of_text(&noisy), ContentHash::of_text(&text));
            }
        }
    }
}
