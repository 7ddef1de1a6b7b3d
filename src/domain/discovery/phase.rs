//! Discovery phases and the function that selects the active one.
//!
//! The phase is never stored as a pointer. It is recomputed from the
//! transcript length and the extracted data on every turn, so data injected
//! from outside can move a session back to an earlier phase.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::extracted::ExtractedData;

/// Transcripts at or below this length are still in the opening exchange.
pub const INITIAL_PHASE_MAX_MESSAGES: usize = 3;

/// Stage of a discovery conversation, in precedence order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// Opening exchange about the item as a whole.
    #[default]
    Initial,
    /// Eliciting sizes, preparations and flavors.
    Variants,
    /// Eliciting toppings, sauces and sides.
    Modifiers,
    /// Eliciting allergens, calories and dietary tags.
    Metadata,
    /// Everything collected; reviewing with the operator.
    Confirmation,
}

impl DiscoveryPhase {
    /// Picks the phase for a transcript of `message_count` messages.
    ///
    /// 1. `message_count <= 3` → `Initial`
    /// 2. no variants → `Variants`
    /// 3. no modifiers → `Modifiers`
    /// 4. no metadata → `Metadata`
    /// 5. otherwise → `Confirmation`
    pub fn determine(message_count: usize, data: &ExtractedData) -> Self {
        if message_count <= INITIAL_PHASE_MAX_MESSAGES {
            Self::Initial
        } else if !data.has_variants() {
            Self::Variants
        } else if !data.has_modifiers() {
            Self::Modifiers
        } else if !data.has_metadata() {
            Self::Metadata
        } else {
            Self::Confirmation
        }
    }

    /// What the assistant should focus on in this phase.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Initial => {
                "Understand the item as a whole: what it is, how it is served, and what makes it distinctive."
            }
            Self::Variants => {
                "Identify the item's variants: sizes, preparation styles, and flavor or heat levels, with price differences."
            }
            Self::Modifiers => {
                "Identify optional modifiers: toppings, add-ons, sauces, dressings, and sides, with prices and selection limits."
            }
            Self::Metadata => {
                "Collect dietary information: allergens, calories or nutrition facts, and dietary suitability."
            }
            Self::Confirmation => {
                "Summarize everything collected and ask the operator to confirm or correct it."
            }
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initial => "Getting started",
            Self::Variants => "Variants",
            Self::Modifiers => "Modifiers",
            Self::Metadata => "Dietary details",
            Self::Confirmation => "Review",
        }
    }

    /// Returns true for phases that extract structured data from the transcript.
    pub fn extracts_data(&self) -> bool {
        matches!(self, Self::Variants | Self::Modifiers | Self::Metadata)
    }
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Variants => "variants",
            Self::Modifiers => "modifiers",
            Self::Metadata => "metadata",
            Self::Confirmation => "confirmation",
        };
        write!(f, "{}", s)
    }
}
