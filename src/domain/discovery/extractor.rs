//! Phase-scoped extraction of structured item data from conversation text.
//!
//! Extraction is vocabulary driven. Each phase scans a fixed table of terms,
//! and every match gets the fixed confidence of its category. Only the most
//! recent messages are scanned, so earlier turns are never re-extracted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::extracted::{
    dedup_modifiers, dedup_variants, ExtractedData, ExtractedModifier, ExtractedVariant,
    ItemMetadata, SelectionType, VariantType,
};
use super::message::Message;
use super::phase::DiscoveryPhase;

/// Confidence for size terms.
pub const SIZE_CONFIDENCE: f64 = 0.9;
/// Confidence for preparation terms.
pub const PREPARATION_CONFIDENCE: f64 = 0.85;
/// Confidence for flavor and heat terms.
pub const FLAVOR_CONFIDENCE: f64 = 0.8;

/// A vocabulary entry: canonical name, display name, price delta, and the
/// pattern that recognizes it in lowercase text.
struct Term {
    name: &'static str,
    display: &'static str,
    price: f64,
    pattern: Regex,
}

impl Term {
    fn new(name: &'static str, display: &'static str, price: f64, pattern: &str) -> Self {
        Self {
            name,
            display,
            price,
            pattern: Regex::new(&format!(r"\b(?:{})\b", pattern))
                .expect("vocabulary pattern is valid"),
        }
    }
}

struct VariantVocabulary {
    variant_type: VariantType,
    confidence: f64,
    terms: Vec<Term>,
}

struct ModifierGroup {
    group_name: &'static str,
    selection_type: SelectionType,
    max_selections: u32,
    confidence: f64,
    trigger: Regex,
    terms: Vec<Term>,
}

static VARIANT_VOCABULARIES: Lazy<Vec<VariantVocabulary>> = Lazy::new(|| {
    vec![
        VariantVocabulary {
            variant_type: VariantType::Size,
            confidence: SIZE_CONFIDENCE,
            terms: vec![
                Term::new("small", "Small", -2.00, "small"),
                Term::new("medium", "Medium", 0.00, "medium"),
                Term::new("large", "Large", 2.00, "large"),
                Term::new("extra_large", "Extra Large", 3.50, r"extra[\s-]large"),
                Term::new("xl", "XL", 3.50, "xl"),
                Term::new("xxl", "XXL", 5.00, "xxl"),
            ],
        },
        VariantVocabulary {
            variant_type: VariantType::Preparation,
            confidence: PREPARATION_CONFIDENCE,
            terms: vec![
                Term::new("grilled", "Grilled", 0.00, "grilled"),
                Term::new("fried", "Fried", 0.00, "fried"),
                Term::new("baked", "Baked", 0.00, "baked"),
                Term::new("roasted", "Roasted", 0.00, "roasted"),
                Term::new("steamed", "Steamed", 0.00, "steamed"),
                Term::new("sauteed", "Sautéed", 0.00, "saut[eé]ed"),
                Term::new("smoked", "Smoked", 0.00, "smoked"),
                Term::new("braised", "Braised", 0.00, "braised"),
            ],
        },
        VariantVocabulary {
            variant_type: VariantType::Flavor,
            confidence: FLAVOR_CONFIDENCE,
            terms: vec![
                Term::new("mild", "Mild", 0.00, "mild"),
                Term::new("regular", "Regular", 0.00, "regular"),
                Term::new("spicy", "Spicy", 0.00, "spicy"),
                Term::new("extra_spicy", "Extra Spicy", 0.50, r"extra[\s-]spicy"),
                Term::new("hot", "Hot", 0.00, "hot"),
            ],
        },
    ]
});

static MODIFIER_GROUPS: Lazy<Vec<ModifierGroup>> = Lazy::new(|| {
    vec![
        ModifierGroup {
            group_name: "toppings",
            selection_type: SelectionType::Multiple,
            max_selections: 5,
            confidence: 0.8,
            trigger: trigger(r"toppings?|add[\s-]?ons?|extras"),
            terms: vec![
                Term::new("extra_cheese", "Extra Cheese", 1.50, r"extra cheese"),
                Term::new("mushrooms", "Mushrooms", 1.00, r"mushrooms?"),
                Term::new("pepperoni", "Pepperoni", 1.50, "pepperoni"),
                Term::new("olives", "Olives", 0.75, r"olives?"),
                Term::new("onions", "Onions", 0.50, r"onions?"),
                Term::new("bacon", "Bacon", 2.00, "bacon"),
                Term::new("jalapenos", "Jalapeños", 0.75, r"jalape[nñ]os?"),
                Term::new("avocado", "Avocado", 1.50, "avocado|palta"),
                Term::new("tomatoes", "Tomatoes", 0.50, r"tomato(?:es)?"),
            ],
        },
        ModifierGroup {
            group_name: "sauces",
            selection_type: SelectionType::Multiple,
            max_selections: 2,
            confidence: 0.8,
            trigger: trigger(r"sauces?|dressings?"),
            terms: vec![
                Term::new("ketchup", "Ketchup", 0.00, "ketchup"),
                Term::new("mayonnaise", "Mayonnaise", 0.00, "mayo|mayonnaise"),
                Term::new("bbq_sauce", "BBQ Sauce", 0.50, "bbq|barbecue"),
                Term::new("ranch", "Ranch", 0.50, "ranch"),
                Term::new("garlic_aioli", "Garlic Aioli", 0.75, "aioli"),
                Term::new("hot_sauce", "Hot Sauce", 0.00, r"hot sauce"),
                Term::new("honey_mustard", "Honey Mustard", 0.50, r"honey mustard"),
                Term::new("chipotle", "Chipotle", 0.50, "chipotle"),
            ],
        },
        ModifierGroup {
            group_name: "sides",
            selection_type: SelectionType::Single,
            max_selections: 1,
            confidence: 0.75,
            trigger: trigger(r"sides?|comes with"),
            terms: vec![
                Term::new("fries", "French Fries", 2.50, r"(?:french )?fries"),
                Term::new("side_salad", "Side Salad", 3.00, "salad"),
                Term::new("rice", "Rice", 2.00, "rice"),
                Term::new("coleslaw", "Coleslaw", 2.00, r"cole ?slaw"),
                Term::new("onion_rings", "Onion Rings", 3.00, r"onion rings"),
                Term::new("mashed_potatoes", "Mashed Potatoes", 2.50, r"mashed potato(?:es)?"),
            ],
        },
    ]
});

static ALLERGEN_TRIGGER: Lazy<Regex> = Lazy::new(|| trigger("allergens?|allergy|allergies"));
static NUTRITION_TRIGGER: Lazy<Regex> = Lazy::new(|| trigger("calories?|nutrition(?:al)?"));
static DIETARY_TRIGGER: Lazy<Regex> =
    Lazy::new(|| trigger(r"dietary|diet|vegetarian|vegan|halal|kosher|gluten[\s-]free"));
static CALORIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,5})\s*(?:calories|kcal)\b").expect("calorie pattern is valid"));

static ALLERGENS: Lazy<Vec<Term>> = Lazy::new(|| {
    vec![
        Term::new("gluten", "Gluten", 0.0, "gluten|wheat|flour"),
        Term::new("dairy", "Dairy", 0.0, r"dairy|milk|cheese|cream|butter|lactose"),
        Term::new("eggs", "Eggs", 0.0, r"eggs?"),
        Term::new("peanuts", "Peanuts", 0.0, r"peanuts?"),
        Term::new(
            "tree_nuts",
            "Tree Nuts",
            0.0,
            r"(?:tree )?nuts|almonds?|walnuts?|cashews?|pecans?|pistachios?",
        ),
        Term::new("shellfish", "Shellfish", 0.0, r"shellfish|shrimp|prawns?|crab|lobster"),
        Term::new("fish", "Fish", 0.0, r"fish|salmon|tuna|anchov(?:y|ies)"),
        Term::new("soy", "Soy", 0.0, "soy|tofu"),
        Term::new("sesame", "Sesame", 0.0, "sesame"),
    ]
});

static DIETARY_TAGS: Lazy<Vec<Term>> = Lazy::new(|| {
    vec![
        Term::new("vegetarian", "Vegetarian", 0.0, "vegetarian"),
        Term::new("vegan", "Vegan", 0.0, "vegan"),
        Term::new("gluten_free", "Gluten-Free", 0.0, r"gluten[\s-]free"),
        Term::new("dairy_free", "Dairy-Free", 0.0, r"dairy[\s-]free"),
        Term::new("halal", "Halal", 0.0, "halal"),
        Term::new("kosher", "Kosher", 0.0, "kosher"),
    ]
});

/// Keyword → category guesses, checked in order.
static CATEGORY_HINTS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("pizza", r"pizzas?|calzone"),
        ("burgers", r"(?:cheese|ham)?burgers?"),
        ("sandwiches", r"sandwich(?:es)?|wraps?|churrasco|barros luco"),
        ("empanadas", r"empanadas?"),
        ("pasta", r"pasta|spaghetti|lasagna|penne|fettuccine|ravioli|gnocchi"),
        ("mexican", r"tacos?|burritos?|quesadillas?|nachos"),
        ("sushi", r"sushi|sashimi|maki|nigiri"),
        ("salads", r"salads?"),
        ("soups", r"soups?|cazuela|ramen"),
        ("grill", r"steak|ribeye|sirloin|lomo|parrilla|ribs"),
        ("desserts", r"cakes?|brownies?|ice cream|pies?|desserts?|flan|tiramisu"),
        ("beverages", r"coffee|latte|espresso|tea|juice|soda|lemonade|smoothie"),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, trigger(pattern)))
    .collect()
});

fn trigger(pattern: &str) -> Regex {
    Regex::new(&format!(r"\b(?:{})\b", pattern)).expect("trigger pattern is valid")
}

/// Up-front structural reading of a raw item name and description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAnalysis {
    pub suggested_category: Option<String>,
    pub variants: Vec<ExtractedVariant>,
    pub modifiers: Vec<ExtractedModifier>,
    pub metadata: ItemMetadata,
}

impl ItemAnalysis {
    /// Returns true when the raw text yielded nothing.
    pub fn is_empty(&self) -> bool {
        self.suggested_category.is_none()
            && self.variants.is_empty()
            && self.modifiers.is_empty()
            && self.metadata.is_empty()
    }
}

/// Vocabulary-based extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionEngine;

impl ExtractionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the data owned by `phase` from the last `window` messages.
    ///
    /// Returns an `ExtractedData` whose only populated field is the one the
    /// phase owns; phases that do not extract return an empty value.
    pub fn extract_for_phase(
        &self,
        phase: DiscoveryPhase,
        conversation: &[Message],
        window: usize,
    ) -> ExtractedData {
        let start = conversation.len().saturating_sub(window);
        let text = conversation[start..]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();

        match phase {
            DiscoveryPhase::Variants => ExtractedData {
                variants: Some(self.extract_variants(&text)),
                ..Default::default()
            },
            DiscoveryPhase::Modifiers => ExtractedData {
                modifiers: Some(self.extract_modifiers(&text)),
                ..Default::default()
            },
            DiscoveryPhase::Metadata => ExtractedData {
                metadata: Some(self.extract_metadata(&text)),
                ..Default::default()
            },
            DiscoveryPhase::Initial | DiscoveryPhase::Confirmation => ExtractedData::default(),
        }
    }

    /// Finds size, preparation and flavor terms. Deduplicated by name.
    pub fn extract_variants(&self, text: &str) -> Vec<ExtractedVariant> {
        let text = text.to_lowercase();
        let mut found = Vec::new();

        for vocabulary in VARIANT_VOCABULARIES.iter() {
            let mut hits: Vec<(usize, &Term)> = vocabulary
                .terms
                .iter()
                .filter_map(|term| term.pattern.find(&text).map(|m| (m.start(), term)))
                .collect();
            hits.sort_by_key(|(pos, _)| *pos);

            for (_, term) in hits {
                if shadowed_by_longer_term(&text, term, &vocabulary.terms) {
                    continue;
                }
                found.push(ExtractedVariant {
                    name: term.name.to_string(),
                    display_name: term.display.to_string(),
                    variant_type: vocabulary.variant_type,
                    price_adjustment: term.price,
                    confidence: vocabulary.confidence,
                    reasoning: format!("'{}' mentioned in conversation", term.display),
                });
            }
        }

        dedup_variants(found)
    }

    /// Finds modifiers for every group whose trigger word appears.
    pub fn extract_modifiers(&self, text: &str) -> Vec<ExtractedModifier> {
        let text = text.to_lowercase();
        let groups = MODIFIER_GROUPS
            .iter()
            .filter(|group| group.trigger.is_match(&text));
        dedup_modifiers(groups.flat_map(|g| scan_group(g, &text)).collect())
    }

    /// Finds allergens, the first calorie figure and dietary tags, each behind
    /// its own trigger word.
    pub fn extract_metadata(&self, text: &str) -> ItemMetadata {
        let text = text.to_lowercase();
        let mut metadata = ItemMetadata::default();

        if ALLERGEN_TRIGGER.is_match(&text) {
            metadata.allergens = matching_names(&ALLERGENS, &text);
        }
        if NUTRITION_TRIGGER.is_match(&text) {
            metadata.calories = CALORIES
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok());
        }
        if DIETARY_TRIGGER.is_match(&text) {
            metadata.dietary_tags = matching_names(&DIETARY_TAGS, &text);
        }

        metadata
    }

    /// Reads structure out of the raw name and description before any
    /// conversation has happened. Trigger words are not required here.
    pub fn analyze_item(&self, item_name: &str, description: Option<&str>) -> ItemAnalysis {
        let text = match description {
            Some(desc) => format!("{}\n{}", item_name, desc),
            None => item_name.to_string(),
        }
        .to_lowercase();

        let suggested_category = CATEGORY_HINTS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&text))
            .map(|(category, _)| category.to_string());

        let modifiers = dedup_modifiers(
            MODIFIER_GROUPS
                .iter()
                .flat_map(|g| scan_group(g, &text))
                .collect(),
        );

        ItemAnalysis {
            suggested_category,
            variants: self.extract_variants(&text),
            modifiers,
            metadata: ItemMetadata {
                allergens: matching_names(&ALLERGENS, &text),
                calories: None,
                dietary_tags: matching_names(&DIETARY_TAGS, &text),
            },
        }
    }
}

/// True when every occurrence of `term` sits inside a longer term of the same
/// vocabulary (e.g. "spicy" inside "extra spicy").
fn shadowed_by_longer_term(text: &str, term: &Term, terms: &[Term]) -> bool {
    let longer: Vec<(usize, usize)> = terms
        .iter()
        .filter(|other| other.name != term.name)
        .flat_map(|other| other.pattern.find_iter(text).map(|m| (m.start(), m.end())))
        .collect();

    term.pattern.find_iter(text).all(|m| {
        longer
            .iter()
            .any(|&(start, end)| start <= m.start() && m.end() <= end && end - start > m.len())
    })
}

fn scan_group(group: &ModifierGroup, text: &str) -> Vec<ExtractedModifier> {
    group
        .terms
        .iter()
        .filter(|term| term.pattern.is_match(text))
        .map(|term| ExtractedModifier {
            group_name: group.group_name.to_string(),
            name: term.name.to_string(),
            display_name: term.display.to_string(),
            selection_type: group.selection_type,
            price_adjustment: term.price,
            required: false,
            min_selections: 0,
            max_selections: group.max_selections,
            confidence: group.confidence,
            reasoning: format!("'{}' mentioned alongside {}", term.display, group.group_name),
        })
        .collect()
}

fn matching_names(terms: &[Term], text: &str) -> Vec<String> {
    terms
        .iter()
        .filter(|term| term.pattern.is_match(text))
        .map(|term| term.name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(variants: &[ExtractedVariant]) -> Vec<&str> {
        variants.iter().map(|v| v.name.as_str()).collect()
    }

    mod variants {
        use super::*;

        #[test]
        fn finds_sizes_with_price_table() {
            let variants = ExtractionEngine::new().extract_variants("We sell small and large");
            assert_eq!(names(&variants), vec!["small", "large"]);
            assert_eq!(variants[0].price_adjustment, -2.00);
            assert_eq!(variants[1].price_adjustment, 2.00);
            assert!(variants.iter().all(|v| v.confidence == SIZE_CONFIDENCE));
        }

        #[test]
        fn repeated_term_yields_one_variant() {
            let variants = ExtractionEngine::new()
                .extract_variants("Small is popular. The small one sells out. SMALL!");
            assert_eq!(names(&variants), vec!["small"]);
        }

        #[test]
        fn extra_large_is_not_also_large() {
            let variants = ExtractionEngine::new().extract_variants("only extra large");
            assert_eq!(names(&variants), vec!["extra_large"]);
        }

        #[test]
        fn large_still_found_when_standalone_too() {
            let variants = ExtractionEngine::new().extract_variants("large or extra-large");
            assert_eq!(names(&variants), vec!["large", "extra_large"]);
        }

        #[test]
        fn preparation_and_flavor_use_fixed_confidence() {
            let variants = ExtractionEngine::new().extract_variants("grilled, mild or extra spicy");
            let grilled = variants.iter().find(|v| v.name == "grilled").unwrap();
            assert_eq!(grilled.variant_type, VariantType::Preparation);
            assert_eq!(grilled.confidence, PREPARATION_CONFIDENCE);

            let spicy = variants.iter().find(|v| v.name == "extra_spicy").unwrap();
            assert_eq!(spicy.variant_type, VariantType::Flavor);
            assert_eq!(spicy.confidence, FLAVOR_CONFIDENCE);
            assert!(!variants.iter().any(|v| v.name == "spicy"));
        }

        #[test]
        fn word_boundaries_are_respected() {
            let variants = ExtractionEngine::new().extract_variants("smallish portions, shot glasses");
            assert!(variants.is_empty());
        }
    }

    mod modifiers {
        use super::*;

        #[test]
        fn requires_trigger_word() {
            let engine = ExtractionEngine::new();
            assert!(engine.extract_modifiers("bacon and olives").is_empty());

            let modifiers = engine.extract_modifiers("toppings: bacon and olives");
            let names: Vec<_> = modifiers.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["olives", "bacon"]);
            assert!(modifiers.iter().all(|m| m.group_name == "toppings"));
        }

        #[test]
        fn sides_are_single_select() {
            let modifiers = ExtractionEngine::new().extract_modifiers("it comes with fries or rice");
            assert_eq!(modifiers.len(), 2);
            assert!(modifiers
                .iter()
                .all(|m| m.selection_type == SelectionType::Single && m.max_selections == 1));
            assert_eq!(modifiers[0].display_name, "French Fries");
        }

        #[test]
        fn sauce_trigger_scans_sauce_vocabulary() {
            let modifiers = ExtractionEngine::new().extract_modifiers("dressing options: ranch, bbq");
            let names: Vec<_> = modifiers.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["bbq_sauce", "ranch"]);
        }
    }

    mod metadata {
        use super::*;

        #[test]
        fn allergens_need_trigger() {
            let engine = ExtractionEngine::new();
            assert!(engine.extract_metadata("cheese and flour").allergens.is_empty());

            let meta = engine.extract_metadata("Allergens: cheese and flour");
            assert_eq!(meta.allergens, vec!["gluten", "dairy"]);
        }

        #[test]
        fn takes_first_calorie_figure() {
            let meta = ExtractionEngine::new()
                .extract_metadata("Nutrition: 850 calories per pizza, 210 calories per slice");
            assert_eq!(meta.calories, Some(850));
        }

        #[test]
        fn calorie_figure_needs_trigger() {
            let meta = ExtractionEngine::new().extract_metadata("about 850 kcal");
            assert_eq!(meta.calories, None);
        }

        #[test]
        fn collects_dietary_tags() {
            let meta = ExtractionEngine::new().extract_metadata("It is vegetarian and gluten-free");
            assert_eq!(meta.dietary_tags, vec!["vegetarian", "gluten_free"]);
        }
    }

    mod phase_scoping {
        use super::*;

        fn conversation(texts: &[&str]) -> Vec<Message> {
            texts.iter().map(|t| Message::assistant(*t)).collect()
        }

        #[test]
        fn only_scans_the_window() {
            let messages = conversation(&["small", "x", "y", "z"]);
            let data = ExtractionEngine::new().extract_for_phase(
                DiscoveryPhase::Variants,
                &messages,
                3,
            );
            assert_eq!(data.variants, Some(Vec::new()));
        }

        #[test]
        fn populates_only_the_phase_field() {
            let messages = conversation(&["toppings: bacon", "small or large", "allergens: milk"]);
            let engine = ExtractionEngine::new();

            let data = engine.extract_for_phase(DiscoveryPhase::Variants, &messages, 3);
            assert!(data.has_variants());
            assert!(data.modifiers.is_none() && data.metadata.is_none());

            let data = engine.extract_for_phase(DiscoveryPhase::Metadata, &messages, 3);
            assert!(data.has_metadata());
            assert!(data.variants.is_none() && data.modifiers.is_none());
        }

        #[test]
        fn non_extracting_phases_return_nothing() {
            let messages = conversation(&["small, toppings: bacon"]);
            let engine = ExtractionEngine::new();
            for phase in [DiscoveryPhase::Initial, DiscoveryPhase::Confirmation] {
                assert_eq!(
                    engine.extract_for_phase(phase, &messages, 3),
                    ExtractedData::default()
                );
            }
        }

        #[test]
        fn window_larger_than_transcript_is_fine() {
            let messages = conversation(&["large"]);
            let data = ExtractionEngine::new().extract_for_phase(
                DiscoveryPhase::Variants,
                &messages,
                10,
            );
            assert_eq!(data.variants().len(), 1);
        }
    }

    mod analysis {
        use super::*;

        #[test]
        fn guesses_category_and_ingredients() {
            let analysis = ExtractionEngine::new().analyze_item(
                "Margherita Pizza",
                Some("Tomato, mozzarella cheese and basil, baked in a wood oven"),
            );
            assert_eq!(analysis.suggested_category.as_deref(), Some("pizza"));
            assert!(analysis.variants.iter().any(|v| v.name == "baked"));
            assert!(analysis.modifiers.iter().any(|m| m.name == "tomatoes"));
            assert!(analysis.metadata.allergens.contains(&"dairy".to_string()));
        }

        #[test]
        fn unknown_item_is_empty() {
            let analysis = ExtractionEngine::new().analyze_item("Chef's surprise", None);
            assert!(analysis.is_empty());
        }
    }
}
