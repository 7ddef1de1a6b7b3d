//! Structured item data elicited from the conversation.
//!
//! Each top-level field of [`ExtractedData`] is an `Option`: `None` means the
//! corresponding phase has never produced output, `Some(empty)` means it ran
//! and found nothing. Phase determination treats both as "empty".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Fixed score assigned to the metadata category when any metadata exists.
pub const METADATA_CONFIDENCE: f64 = 0.85;

/// Kind of variant dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    Size,
    Preparation,
    Flavor,
}

/// A variant of the menu item (a size, a cooking style, a heat level...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedVariant {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub price_adjustment: f64,
    pub confidence: f64,
    pub reasoning: String,
}

/// Whether a modifier group accepts one or many choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionType {
    Single,
    Multiple,
}

/// An add-on option belonging to a modifier group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedModifier {
    pub group_name: String,
    pub name: String,
    pub display_name: String,
    pub selection_type: SelectionType,
    pub price_adjustment: f64,
    pub required: bool,
    pub min_selections: u32,
    pub max_selections: u32,
    pub confidence: f64,
    pub reasoning: String,
}

impl ExtractedModifier {
    /// Composite identity used for deduplication.
    pub fn key(&self) -> (&str, &str) {
        (&self.group_name, &self.name)
    }
}

/// Dietary and nutritional facts about the item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary_tags: Vec<String>,
}

impl ItemMetadata {
    /// Returns true if no fact has been recorded.
    pub fn is_empty(&self) -> bool {
        self.allergens.is_empty() && self.calories.is_none() && self.dietary_tags.is_empty()
    }

    /// Folds `other` into `self`; existing values win.
    pub fn merge(&mut self, other: ItemMetadata) {
        for allergen in other.allergens {
            if !self.allergens.contains(&allergen) {
                self.allergens.push(allergen);
            }
        }
        if self.calories.is_none() {
            self.calories = other.calories;
        }
        for tag in other.dietary_tags {
            if !self.dietary_tags.contains(&tag) {
                self.dietary_tags.push(tag);
            }
        }
    }
}

/// Everything extracted so far for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default)]
    pub variants: Option<Vec<ExtractedVariant>>,
    #[serde(default)]
    pub modifiers: Option<Vec<ExtractedModifier>>,
    #[serde(default)]
    pub metadata: Option<ItemMetadata>,
}

impl ExtractedData {
    pub fn has_variants(&self) -> bool {
        self.variants.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn has_modifiers(&self) -> bool {
        self.modifiers.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// Returns variants, or an empty slice when absent.
    pub fn variants(&self) -> &[ExtractedVariant] {
        self.variants.as_deref().unwrap_or_default()
    }

    /// Returns modifiers, or an empty slice when absent.
    pub fn modifiers(&self) -> &[ExtractedModifier] {
        self.modifiers.as_deref().unwrap_or_default()
    }

    /// Merges `update` into `self`, touching only the fields `update` carries.
    ///
    /// Lists keep first-seen entries: an incoming variant whose name (or
    /// modifier whose group/name pair) already exists is dropped.
    pub fn merge(&mut self, update: ExtractedData) {
        if let Some(incoming) = update.variants {
            let mut merged = self.variants.take().unwrap_or_default();
            merged.extend(incoming);
            self.variants = Some(dedup_variants(merged));
        }
        if let Some(incoming) = update.modifiers {
            let mut merged = self.modifiers.take().unwrap_or_default();
            merged.extend(incoming);
            self.modifiers = Some(dedup_modifiers(merged));
        }
        if let Some(incoming) = update.metadata {
            self.metadata.get_or_insert_with(ItemMetadata::default).merge(incoming);
        }
    }

    /// Produces deduplicated lists ordered by descending confidence.
    pub fn consolidated(&self) -> ExtractedData {
        let mut variants = dedup_variants(self.variants().to_vec());
        variants.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut modifiers = dedup_modifiers(self.modifiers().to_vec());
        modifiers.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        ExtractedData {
            variants: self.variants.as_ref().map(|_| variants),
            modifiers: self.modifiers.as_ref().map(|_| modifiers),
            metadata: self.metadata.clone(),
        }
    }
}

/// Keeps the first variant for each name.
pub fn dedup_variants(variants: Vec<ExtractedVariant>) -> Vec<ExtractedVariant> {
    let mut seen = HashSet::new();
    variants
        .into_iter()
        .filter(|v| seen.insert(v.name.clone()))
        .collect()
}

/// Keeps the first modifier for each (group, name) pair.
pub fn dedup_modifiers(modifiers: Vec<ExtractedModifier>) -> Vec<ExtractedModifier> {
    let mut seen = HashSet::new();
    modifiers
        .into_iter()
        .filter(|m| seen.insert((m.group_name.clone(), m.name.clone())))
        .collect()
}

/// Per-category confidence in what was extracted.
///
/// `variants` and `modifiers` are omitted when nothing of that kind exists;
/// `overall` averages only the categories that were scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<f64>,
    pub metadata: f64,
    pub overall: f64,
}

impl ConfidenceScores {
    /// Scores extracted data.
    pub fn compute(data: &ExtractedData) -> Self {
        let variants = mean(data.variants().iter().map(|v| v.confidence));
        let modifiers = mean(data.modifiers().iter().map(|m| m.confidence));
        let metadata = if data.has_metadata() {
            METADATA_CONFIDENCE
        } else {
            0.0
        };

        let scored = [variants, modifiers, Some(metadata)];
        let overall = mean(scored.into_iter().flatten()).unwrap_or(0.0);

        Self {
            variants,
            modifiers,
            metadata,
            overall,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
