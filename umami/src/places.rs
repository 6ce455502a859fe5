//! Place directory collaborator: text search, details, geocoding.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::{Result, UmamiError};
use crate::models::{Candidate, GeoPoint, PlaceDetails, Review};

const DETAILS_FIELDS: &str =
    "name,place_id,formatted_address,opening_hours,website,url,rating,reviews,types,price_level,geometry,photos";

#[async_trait]
pub trait PlaceDirectory: Send + Sync {
    /// Free-text search for candidate places. May be empty.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>>;

    /// Full details for a known place id. Fails on unknown ids.
    async fn details(&self, place_id: &str) -> Result<PlaceDetails>;

    /// Resolve a free-text address to coordinates.
    async fn geocode(&self, address: &str) -> Result<GeoPoint>;
}

/// Google Places / Geocoding web service client.
#[derive(Clone)]
pub struct GooglePlaces {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
}

impl GooglePlaces {
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        Self::with_base_url(config, "https://maps.googleapis.com")
    }

    /// Base URL override, used by tests to point at a mock server.
    pub fn with_base_url(config: &GoogleConfig, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    name: String,
    place_id: String,
    #[serde(default)]
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: Option<DetailsResult>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    place_id: String,
    #[serde(default)]
    formatted_address: String,
    rating: Option<f64>,
    price_level: Option<u8>,
    opening_hours: Option<OpeningHours>,
    website: Option<String>,
    url: Option<String>,
    #[serde(default)]
    reviews: Vec<ReviewEntry>,
    #[serde(default)]
    types: Vec<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Default, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    weekday_text: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewEntry {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

impl From<DetailsResult> for PlaceDetails {
    fn from(result: DetailsResult) -> Self {
        PlaceDetails {
            place_id: result.place_id,
            name: result.name,
            address: result.formatted_address,
            rating: result.rating,
            price_level: result.price_level,
            opening_hours: result.opening_hours.unwrap_or_default().weekday_text,
            website: result.website,
            map_url: result.url,
            photo_reference: result
                .photos
                .into_iter()
                .next()
                .and_then(|p| p.photo_reference),
            reviews: result
                .reviews
                .into_iter()
                .filter(|r| !r.text.is_empty())
                .map(|r| Review { text: r.text })
                .collect(),
            category_hints: result.types,
            location: result.geometry.and_then(|g| g.location),
        }
    }
}

#[async_trait]
impl PlaceDirectory for GooglePlaces {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let url = format!("{}/maps/api/place/textsearch/json", self.base_url);
        let response: TextSearchResponse = self
            .client
            .get(url)
            .query(&[
                ("query", query),
                ("language", &self.language),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .results
            .into_iter()
            .map(|r| Candidate {
                place_id: r.place_id,
                name: r.name,
                address: r.formatted_address,
            })
            .collect())
    }

    async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
        let url = format!("{}/maps/api/place/details/json", self.base_url);
        let response: DetailsResponse = self
            .client
            .get(url)
            .query(&[
                ("place_id", place_id),
                ("fields", DETAILS_FIELDS),
                ("language", &self.language),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = response
            .result
            .ok_or_else(|| UmamiError::NotFound(format!("No details for place {place_id}")))?;

        Ok(result.into())
    }

    async fn geocode(&self, address: &str) -> Result<GeoPoint> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let response: GeocodeResponse = self
            .client
            .get(url)
            .query(&[
                ("address", address),
                ("language", &self.language),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.geometry.location)
            .ok_or_else(|| UmamiError::NotFound(format!("Could not geocode '{address}'")))
    }
}
