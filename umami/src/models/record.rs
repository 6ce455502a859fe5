use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::place::{GeoPoint, PlaceDetails, StoreType};

/// Opaque identifier for a persisted record, as returned by the record
/// store after an upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit persisted to the record store: raw place details plus the
/// AI-derived augmentation and the user's optional comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedStore {
    pub details: PlaceDetails,
    pub summary: String,
    pub tags: BTreeSet<String>,
    pub store_type: StoreType,
    /// Up to three recommended menu items, in model order.
    pub recommendations: Vec<String>,
    pub comment: Option<String>,
}

impl EnrichedStore {
    pub fn place_id(&self) -> &str {
        &self.details.place_id
    }
}

/// A row read back from the record store, used by the nearby-ranking
/// path. Fields mirror what the store actually keeps, so anything the
/// user never filled in comes back as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record_id: RecordId,
    pub place_id: String,
    pub name: String,
    pub location: Option<GeoPoint>,
    /// Rating from the place directory (0.0–5.0).
    pub rating: Option<f64>,
    /// The user's own rating (0.0–5.0), if they recorded one.
    pub personal_rating: Option<f64>,
    pub price_level: Option<u8>,
    pub tags: BTreeSet<String>,
    pub store_type: StoreType,
    pub summary: String,
}
