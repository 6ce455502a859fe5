use serde::{Deserialize, Serialize};

/// A lat/lng pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A lightweight search result, before detail enrichment.
///
/// Ephemeral: produced by a text search, held in the session only long
/// enough to validate the user's selection against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub place_id: String,
    pub name: String,
    pub address: String,
}

/// A single user review as returned by the place directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    pub text: String,
}

/// AI-inferred store classification: a one-word type plus a short
/// free-form subtype description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreType {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
}

/// Full details for a place, fetched fresh per selection. Not cached
/// across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
    pub opening_hours: Vec<String>,
    pub website: Option<String>,
    pub map_url: Option<String>,
    pub photo_reference: Option<String>,
    pub reviews: Vec<Review>,
    /// Raw category hints from the directory (e.g. Google "types").
    pub category_hints: Vec<String>,
    pub location: Option<GeoPoint>,
}
