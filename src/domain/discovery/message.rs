//! Conversation messages and the interactive markup embedded in them.
//!
//! Assistant replies may carry UI affordances inline:
//!
//! - `[CHECKBOX: opt1, opt2, ...]`
//! - `[SELECT: label|opt1,opt2,...]`
//!
//! These are the only structured signals read from model-authored text.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

static MARKUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(CHECKBOX|SELECT):\s*([^\]]*)\]").expect("markup pattern is valid")
});

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions that frame the model's behavior.
    System,
    /// Operator input.
    User,
    /// Model reply.
    Assistant,
}

/// A UI affordance parsed from assistant markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractiveElement {
    /// Multi-choice group.
    Checkbox { options: Vec<String> },
    /// Single-choice dropdown with a label.
    Select { label: String, options: Vec<String> },
}

impl InteractiveElement {
    /// Returns the options offered by this element.
    pub fn options(&self) -> &[String] {
        match self {
            Self::Checkbox { options } | Self::Select { options, .. } => options,
        }
    }
}

/// Parses every well-formed markup token in `text`, in document order.
///
/// Tokens with no usable options, and SELECT tokens without a `|`
/// separator, are skipped.
pub fn parse_interactive_elements(text: &str) -> Vec<InteractiveElement> {
    MARKUP_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let kind = caps.get(1)?.as_str().to_ascii_uppercase();
            let body = caps.get(2)?.as_str();

            match kind.as_str() {
                "CHECKBOX" => {
                    let options = split_options(body);
                    (!options.is_empty()).then_some(InteractiveElement::Checkbox { options })
                }
                "SELECT" => {
                    let (label, rest) = body.split_once('|')?;
                    let label = label.trim();
                    let options = split_options(rest);
                    if label.is_empty() || options.is_empty() {
                        return None;
                    }
                    Some(InteractiveElement::Select {
                        label: label.to_string(),
                        options,
                    })
                }
                _ => None,
            }
        })
        .collect()
}

fn split_options(body: &str) -> Vec<String> {
    body.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Structured choices the operator attached to a reply, keyed by group label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSelections(BTreeMap<String, Vec<String>>);

impl UserSelections {
    /// Creates an empty selection set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the values chosen for a group.
    pub fn with_choice(
        mut self,
        label: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.0
            .insert(label.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Iterates groups in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// One entry of the conversation transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactive_elements: Vec<InteractiveElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selections: Option<UserSelections>,
    pub created_at: Timestamp,
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content.into())
    }

    /// Creates a user message, keeping selections only when non-empty.
    pub fn user(content: impl Into<String>, selections: Option<UserSelections>) -> Self {
        let mut message = Self::plain(MessageRole::User, content.into());
        message.selections = selections.filter(|s| !s.is_empty());
        message
    }

    /// Creates an assistant message and parses its interactive markup.
    pub fn assistant(content: impl Into<String>) -> Self {
        let content = content.into();
        let interactive_elements = parse_interactive_elements(&content);
        Self {
            role: MessageRole::Assistant,
            content,
            interactive_elements,
            selections: None,
            created_at: Timestamp::now(),
        }
    }

    fn plain(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            interactive_elements: Vec::new(),
            selections: None,
            created_at: Timestamp::now(),
        }
    }

    /// Returns true for operator-authored messages.
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}
