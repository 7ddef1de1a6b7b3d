//! Name normalization, fingerprinting and fuzzy scoring for menu items.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::cache_key::sha256_hex;
use super::extracted::{ExtractedData, ExtractedModifier, ExtractedVariant};
use crate::domain::foundation::Timestamp;

/// Category used in fingerprints when none is declared.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Multiplier applied when both items declare the same category.
pub const CATEGORY_BOOST: f64 = 1.1;

/// Folds a name to its comparable form.
///
/// Strips diacritics, lowercases, drops everything except letters, digits
/// and whitespace, then collapses and trims whitespace. Idempotent.
pub fn normalize(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Content hash identifying a (name, category) pair.
pub fn fingerprint(name: &str, category: Option<&str>) -> String {
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED);
    sha256_hex(&format!("{}:{}", normalize(name), category))
}

/// Scores how alike two item names are, on a 0-100 scale.
///
/// Equal normalized names score 100. Otherwise the score is the
/// Levenshtein distance scaled by the longer name. A shared, declared
/// category multiplies the score by [`CATEGORY_BOOST`], capped at 100.
pub fn similarity(a: &str, b: &str, categories: (Option<&str>, Option<&str>)) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    let base = if a == b {
        100.0
    } else {
        let longest = a.chars().count().max(b.chars().count());
        let distance = strsim::levenshtein(&a, &b);
        (1.0 - distance as f64 / longest as f64) * 100.0
    };

    let boosted = match categories {
        (Some(x), Some(y)) if !x.trim().is_empty() && x.trim().eq_ignore_ascii_case(y.trim()) => {
            base * CATEGORY_BOOST
        }
        _ => base,
    };

    round2(boosted.clamp(0.0, 100.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Where a stored extraction came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub cuisine_type: Option<String>,
    #[serde(default)]
    pub price_tier: Option<String>,
}

/// The outcome of a completed discovery, kept for similarity lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExtraction {
    pub fingerprint: String,
    pub item_name: String,
    pub normalized_name: String,
    pub category: Option<String>,
    pub extracted_data: ExtractedData,
    pub metadata: ExtractionMetadata,
    pub confidence: f64,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl StoredExtraction {
    /// Creates a record that expires `ttl_days` from now.
    pub fn new(
        item_name: impl Into<String>,
        category: Option<String>,
        extracted_data: ExtractedData,
        metadata: ExtractionMetadata,
        confidence: f64,
        ttl_days: i64,
    ) -> Self {
        let item_name = item_name.into();
        let created_at = Timestamp::now();
        Self {
            fingerprint: fingerprint(&item_name, category.as_deref()),
            normalized_name: normalize(&item_name),
            item_name,
            category,
            extracted_data,
            metadata,
            confidence,
            created_at,
            expires_at: created_at.plus_days(ttl_days),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.has_passed()
    }
}

/// A prior extraction whose name scored above the lookup threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub item_name: String,
    pub category: Option<String>,
    pub score: f64,
    pub suggested_variants: Vec<ExtractedVariant>,
    pub suggested_modifiers: Vec<ExtractedModifier>,
}

impl SimilarityMatch {
    pub fn from_stored(stored: &StoredExtraction, score: f64) -> Self {
        Self {
            item_name: stored.item_name.clone(),
            category: stored.category.clone(),
            score,
            suggested_variants: stored.extracted_data.variants().to_vec(),
            suggested_modifiers: stored.extracted_data.modifiers().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod normalization {
        use super::*;

        #[test]
        fn strips_diacritics_and_punctuation() {
            assert_eq!(normalize("  Crème Brûlée!! "), "creme brulee");
            assert_eq!(normalize("Jalapeño-Poppers"), "jalapenopoppers");
        }

        #[test]
        fn collapses_whitespace() {
            assert_eq!(normalize("Pollo \t a  la\nplancha"), "pollo a la plancha");
        }

        #[test]
        fn empty_input_stays_empty() {
            assert_eq!(normalize(""), "");
            assert_eq!(normalize("?!"), "");
        }
    }

    mod fingerprints {
        use super::*;

        #[test]
        fn equal_for_logically_identical_names() {
            assert_eq!(
                fingerprint("Crème Brûlée", Some("desserts")),
                fingerprint("creme brulee", Some("desserts"))
            );
        }

        #[test]
        fn category_changes_fingerprint() {
            assert_ne!(
                fingerprint("Caesar", Some("salads")),
                fingerprint("Caesar", Some("cocktails"))
            );
        }

        #[test]
        fn missing_category_is_uncategorized() {
            assert_eq!(
                fingerprint("Caesar", None),
                fingerprint("Caesar", Some(UNCATEGORIZED))
            );
        }
    }

    mod scoring {
        use super::*;

        #[test]
        fn equal_after_normalization_scores_100() {
            assert_eq!(similarity("Café Latte", "cafe latte", (None, None)), 100.0);
        }

        #[test]
        fn scales_edit_distance_by_longer_name() {
            // "pizza" vs "pizzas": one edit over six chars.
            assert_eq!(similarity("pizza", "pizzas", (None, None)), 83.33);
        }

        #[test]
        fn shared_category_boosts_score() {
            let plain = similarity("pizza", "pizzas", (None, None));
            let boosted = similarity("pizza", "pizzas", (Some("Pizza"), Some("pizza")));
            assert_eq!(boosted, 91.67);
            assert!(boosted > plain);
        }

        #[test]
        fn boost_is_capped() {
            assert_eq!(similarity("taco", "taco", (Some("mx"), Some("mx"))), 100.0);
        }

        #[test]
        fn different_categories_do_not_boost() {
            assert_eq!(
                similarity("pizza", "pizzas", (Some("pizza"), Some("pasta"))),
                83.33
            );
        }

        #[test]
        fn disjoint_names_score_zero() {
            assert_eq!(similarity("abc", "xyz", (None, None)), 0.0);
            assert_eq!(similarity("", "xyz", (None, None)), 0.0);
        }
    }

    mod stored {
        use super::*;
        use crate::domain::discovery::extracted::fixtures::variant;

        #[test]
        fn new_record_is_fingerprinted_and_live() {
            let data = ExtractedData {
                variants: Some(vec![variant("large", 0.9)]),
                ..Default::default()
            };
            let stored = StoredExtraction::new(
                "Pizza Margherita",
                Some("pizza".into()),
                data,
                ExtractionMetadata::default(),
                0.9,
                30,
            );
            assert_eq!(stored.fingerprint, fingerprint("pizza margherita", Some("pizza")));
            assert_eq!(stored.normalized_name, "pizza margherita");
            assert!(!stored.is_expired());

            let found = SimilarityMatch::from_stored(&stored, 95.0);
            assert_eq!(found.suggested_variants.len(), 1);
            assert!(found.suggested_modifiers.is_empty());
        }

        #[test]
        fn zero_day_ttl_expires_immediately() {
            let stored = StoredExtraction::new(
                "Soup",
                None,
                ExtractedData::default(),
                ExtractionMetadata::default(),
                0.0,
                0,
            );
            assert!(stored.expires_at <= Timestamp::now());
        }
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in "\\PC{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn identity_scores_100(s in "\\PC{0,40}") {
            prop_assert_eq!(similarity(&s, &s, (None, None)), 100.0);
        }

        #[test]
        fn scores_are_bounded(a in "\\PC{0,30}", b in "\\PC{0,30}", boost in any::<bool>()) {
            let cats = if boost { (Some("x"), Some("x")) } else { (None, None) };
            let score = similarity(&a, &b, cats);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        #[test]
        fn scoring_is_symmetric(a in "[a-zA-Z ]{0,20}", b in "[a-zA-Z ]{0,20}") {
            prop_assert_eq!(similarity(&a, &b, (None, None)), similarity(&b, &a, (None, None)));
        }
    }
}
