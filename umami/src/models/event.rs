use serde::{Deserialize, Serialize};

use super::place::GeoPoint;

/// An inbound user event, decoded once at the transport boundary.
///
/// Surfaces never hand the controller raw payload strings; postback
/// and button payloads are parsed into a variant here so the state
/// machine only ever matches on tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    FreeText { text: String },
    Select { place_id: String },
    AcceptWithComment,
    AcceptNoComment,
    Decline,
    Cancel,
    Location { point: GeoPoint },
    /// Start the location-first nearby flow.
    NearbyRequest,
}

/// A labelled button attached to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptChoice {
    pub label: String,
    /// The event the surface should decode this choice back into.
    pub event: Event,
}

/// A structured store summary for the surfaces to render as a card.
/// Layout is the surface's business; this carries only content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreCard {
    pub title: String,
    pub address: String,
    pub rating_line: String,
    pub price_line: String,
    pub type_line: String,
    pub subtype_line: String,
    pub tags_line: String,
    pub recommendations_line: String,
    pub body: String,
    pub photo_url: Option<String>,
    pub link: Option<String>,
    pub choices: Vec<PromptChoice>,
}

/// What the controller asks a surface to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Prompt {
        text: String,
        choices: Vec<PromptChoice>,
    },
    Card(StoreCard),
    Confirmation {
        text: String,
        link: String,
    },
}

impl OutboundMessage {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn prompt_with(text: impl Into<String>, choices: Vec<PromptChoice>) -> Self {
        Self::Prompt {
            text: text.into(),
            choices,
        }
    }
}
