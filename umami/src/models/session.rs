use serde::{Deserialize, Serialize};

use super::place::{Candidate, GeoPoint};
use super::record::EnrichedStore;

/// The conversation mode a user session is in. A session is always in
/// exactly one mode; an idle user has no stored session at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    AwaitingSelection,
    AwaitingLocation,
    AwaitingSituation,
    AwaitingSaveDecision,
    AwaitingComment,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingSelection => write!(f, "awaiting_selection"),
            Self::AwaitingLocation => write!(f, "awaiting_location"),
            Self::AwaitingSituation => write!(f, "awaiting_situation"),
            Self::AwaitingSaveDecision => write!(f, "awaiting_save_decision"),
            Self::AwaitingComment => write!(f, "awaiting_comment"),
        }
    }
}

/// Per-user conversation state. Last-write-wins, no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub mode: SessionMode,
    /// Bumped each time a session is (re)created for a user. Deferred
    /// work captures the generation it started under and is discarded
    /// if the session was cleared or replaced in the meantime.
    pub generation: u64,
    /// The most recently presented candidate set. Selection events are
    /// validated against this to reject stale buttons.
    pub candidates: Vec<Candidate>,
    /// Enrichment output waiting for the save decision / comment.
    pub pending: Option<EnrichedStore>,
    /// A comment supplied up front (one-shot /save command surface).
    pub preset_comment: Option<String>,
    pub location: Option<GeoPoint>,
    pub situation: Option<String>,
    /// Set while a background enrichment or persistence is in flight
    /// for this user; guards against starting a second one.
    pub work_in_flight: bool,
}

impl UserSession {
    pub fn new(mode: SessionMode, generation: u64) -> Self {
        Self {
            mode,
            generation,
            candidates: Vec::new(),
            pending: None,
            preset_comment: None,
            location: None,
            situation: None,
            work_in_flight: false,
        }
    }

    /// Whether `place_id` is among the most recently presented candidates.
    pub fn knows_candidate(&self, place_id: &str) -> bool {
        self.candidates.iter().any(|c| c.place_id == place_id)
    }
}
