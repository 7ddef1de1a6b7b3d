//! Prompt text for discovery conversations.
//!
//! Pure string builders; nothing here touches the session or the provider.

use std::fmt::Write;

use super::cache_key::ContextDefaults;
use super::extracted::ExtractedData;
use super::extractor::ItemAnalysis;
use super::message::UserSelections;
use super::phase::DiscoveryPhase;
use super::session::RestaurantContext;
use super::similarity::SimilarityMatch;

const SYSTEM_TEMPLATE: &str = r#"You are a menu configuration assistant helping a restaurant operator describe one menu item in structured form.

Work through the item in stages: first the item itself, then its variants (sizes, preparation styles, flavor or heat levels), then its modifiers (toppings, sauces, sides), then dietary details (allergens, calories, dietary suitability), and finally a review.

Guidelines:
- Ask one focused question at a time and keep replies short.
- Suggest realistic options and prices for the restaurant's market, but let the operator decide.
- When offering choices, embed them as markup the interface can render:
  [CHECKBOX: option 1, option 2, option 3] for multiple choice
  [SELECT: label|option 1,option 2] for a single choice
- Never invent allergen or nutrition facts; ask the operator instead."#;

/// System prompt that frames the whole conversation.
pub fn system_prompt(
    item_name: &str,
    context: &RestaurantContext,
    defaults: &ContextDefaults,
) -> String {
    let mut prompt = String::from(SYSTEM_TEMPLATE);
    prompt.push_str("\n\nRestaurant context:\n");
    let _ = writeln!(
        prompt,
        "- Cuisine: {}",
        context.cuisine_type.as_deref().unwrap_or(&defaults.cuisine_type)
    );
    let _ = writeln!(
        prompt,
        "- Location: {}",
        context.location.as_deref().unwrap_or(&defaults.location)
    );
    let _ = writeln!(
        prompt,
        "- Price tier: {}",
        context.price_tier.as_deref().unwrap_or(&defaults.price_tier)
    );
    if let Some(category) = context.category.as_deref() {
        let _ = writeln!(prompt, "- Menu category: {}", category);
    }
    for (key, value) in context.descriptive_extras() {
        let _ = writeln!(prompt, "- {}: {}", key, value);
    }
    let _ = write!(
        prompt,
        "\nThe item under discussion is \"{}\". Reply in the language with code '{}'.",
        item_name,
        context.language.as_deref().unwrap_or(&defaults.language)
    );
    prompt
}

/// First operator-side message: the raw item plus any prior knowledge.
pub fn initial_user_prompt(
    item_name: &str,
    description: Option<&str>,
    analysis: &ItemAnalysis,
    similar: &[SimilarityMatch],
) -> String {
    let mut prompt = format!("I want to add \"{}\" to my menu.", item_name);
    if let Some(description) = description {
        let _ = write!(prompt, "\nDescription: {}", description);
    }

    if !analysis.is_empty() {
        prompt.push_str("\n\nWhat the name and description already suggest:");
        if let Some(category) = &analysis.suggested_category {
            let _ = write!(prompt, "\n- Likely category: {}", category);
        }
        if !analysis.variants.is_empty() {
            let names: Vec<_> = analysis.variants.iter().map(|v| v.display_name.as_str()).collect();
            let _ = write!(prompt, "\n- Variants mentioned: {}", names.join(", "));
        }
        if !analysis.modifiers.is_empty() {
            let names: Vec<_> = analysis.modifiers.iter().map(|m| m.display_name.as_str()).collect();
            let _ = write!(prompt, "\n- Ingredients or add-ons mentioned: {}", names.join(", "));
        }
        if !analysis.metadata.allergens.is_empty() {
            let _ = write!(
                prompt,
                "\n- Possible allergens: {}",
                analysis.metadata.allergens.join(", ")
            );
        }
        if !analysis.metadata.dietary_tags.is_empty() {
            let _ = write!(
                prompt,
                "\n- Dietary hints: {}",
                analysis.metadata.dietary_tags.join(", ")
            );
        }
    }

    if !similar.is_empty() {
        prompt.push_str("\n\nSimilar items configured before:");
        for found in similar {
            let _ = write!(prompt, "\n- {} (similarity {:.0}%)", found.item_name, found.score);
            if !found.suggested_variants.is_empty() {
                let names: Vec<_> =
                    found.suggested_variants.iter().map(|v| v.display_name.as_str()).collect();
                let _ = write!(prompt, "; variants: {}", names.join(", "));
            }
            if !found.suggested_modifiers.is_empty() {
                let names: Vec<_> =
                    found.suggested_modifiers.iter().map(|m| m.display_name.as_str()).collect();
                let _ = write!(prompt, "; modifiers: {}", names.join(", "));
            }
        }
    }

    prompt.push_str("\n\nHelp me configure it. Start by confirming what the item is.");
    prompt
}

/// Per-turn prompt: the operator's words framed by the active phase.
pub fn phase_prompt(
    phase: DiscoveryPhase,
    item_name: &str,
    user_input: &str,
    selections: Option<&UserSelections>,
    collected: &ExtractedData,
) -> String {
    let mut prompt = format!(
        "Current stage: {} (item: {})\nFocus: {}\n\nOperator said: {}",
        phase.label(),
        item_name,
        phase.directive(),
        user_input
    );

    if let Some(selections) = selections.filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nOperator selections:");
        for (label, values) in selections.iter() {
            let _ = write!(prompt, "\n- {}: {}", label, values.join(", "));
        }
    }

    let summary = collected_summary(collected);
    if !summary.is_empty() {
        prompt.push_str("\n\nCollected so far:");
        prompt.push_str(&summary);
    }

    if phase == DiscoveryPhase::Confirmation {
        prompt.push_str("\n\nPresent the full configuration and ask for a final confirmation.");
    }
    prompt
}

fn collected_summary(data: &ExtractedData) -> String {
    let mut out = String::new();
    for variant in data.variants() {
        let _ = write!(
            out,
            "\n- Variant: {} ({:+.2})",
            variant.display_name, variant.price_adjustment
        );
    }
    for modifier in data.modifiers() {
        let _ = write!(
            out,
            "\n- Modifier [{}]: {} ({:+.2})",
            modifier.group_name, modifier.display_name, modifier.price_adjustment
        );
    }
    if let Some(metadata) = data.metadata.as_ref().filter(|m| !m.is_empty()) {
        if !metadata.allergens.is_empty() {
            let _ = write!(out, "\n- Allergens: {}", metadata.allergens.join(", "));
        }
        if let Some(calories) = metadata.calories {
            let _ = write!(out, "\n- Calories: {}", calories);
        }
        if !metadata.dietary_tags.is_empty() {
            let _ = write!(out, "\n- Dietary: {}", metadata.dietary_tags.join(", "));
        }
    }
    out
}
