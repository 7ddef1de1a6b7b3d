//! Discovery domain - conversational elicitation of menu item structure.
//!
//! Everything in this module is pure: no I/O, no clocks beyond timestamps,
//! no provider calls. The application layer drives it.

mod cache_key;
mod context;
mod extracted;
mod extractor;
mod message;
mod phase;
mod prompts;
mod session;
mod similarity;

pub use cache_key::{
    normalize_text, session_key, CacheKeyParams, CachePolicy, ContextDefaults,
    CONVERSATION_KEY_PREFIX, SESSION_KEY_PREFIX,
};
pub use context::ConversationContext;
#[cfg(test)]
pub(crate) use extracted::fixtures;
pub use extracted::{
    dedup_modifiers, dedup_variants, ConfidenceScores, ExtractedData, ExtractedModifier,
    ExtractedVariant, ItemMetadata, SelectionType, VariantType, METADATA_CONFIDENCE,
};
pub use extractor::{
    ExtractionEngine, ItemAnalysis, FLAVOR_CONFIDENCE, PREPARATION_CONFIDENCE, SIZE_CONFIDENCE,
};
pub use message::{
    parse_interactive_elements, InteractiveElement, Message, MessageRole, UserSelections,
};
pub use phase::{DiscoveryPhase, INITIAL_PHASE_MAX_MESSAGES};
pub use prompts::{initial_user_prompt, phase_prompt, system_prompt};
pub use session::{DiscoverySession, DiscoveryStatus, RestaurantContext, FORCE_REFRESH_KEY};
pub use similarity::{
    fingerprint, normalize, similarity, ExtractionMetadata, SimilarityMatch, StoredExtraction,
    CATEGORY_BOOST, UNCATEGORIZED,
};
