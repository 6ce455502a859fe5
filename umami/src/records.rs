//! Record store collaborator: a Notion database of saved stores.
//!
//! One page per place, keyed by the `place_id` rich-text property.
//! Upserts query for an existing page first and patch it, so saving
//! the same store twice never duplicates it.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::NotionConfig;
use crate::error::{Result, UmamiError};
use crate::models::{EnrichedStore, GeoPoint, RecordId, StoreType, StoredRecord};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert-or-update keyed by the store's external place id.
    /// Idempotent: the same place id always maps to the same page.
    async fn upsert(&self, store: &EnrichedStore) -> Result<RecordId>;

    /// User-facing link for a persisted record.
    fn record_url(&self, record_id: &RecordId) -> String;

    /// Every saved record, for the nearby-ranking path.
    async fn list_all(&self) -> Result<Vec<StoredRecord>>;
}

#[derive(Clone)]
pub struct NotionRecords {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
    api_version: String,
    base_url: String,
}

impl NotionRecords {
    pub fn new(config: &NotionConfig) -> Result<Self> {
        Self::with_base_url(config, "https://api.notion.com")
    }

    pub fn with_base_url(config: &NotionConfig, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
            api_version: config.api_version.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.api_version)
    }

    async fn find_page_by_place_id(&self, place_id: &str) -> Result<Option<RecordId>> {
        let url = format!(
            "{}/v1/databases/{}/query",
            self.base_url, self.database_id
        );
        let body = json!({
            "filter": {
                "property": "place_id",
                "rich_text": { "equals": place_id }
            }
        });

        let response: Value = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response["results"]
            .as_array()
            .and_then(|results| results.first())
            .and_then(|page| page["id"].as_str())
            .map(|id| RecordId(id.to_string())))
    }

    fn properties(store: &EnrichedStore) -> Value {
        let details = &store.details;
        let hours_text = details.opening_hours.join("\n");
        let tags: Vec<Value> = store.tags.iter().map(|t| json!({ "name": t })).collect();

        json!({
            "店名": { "title": [{ "text": { "content": details.name } }] },
            "住所": { "rich_text": [{ "text": { "content": details.address } }] },
            "評価": { "number": details.rating },
            "料金": { "number": details.price_level },
            "営業時間": { "rich_text": [{ "text": { "content": hours_text } }] },
            "URL": { "url": details.map_url },
            "公式サイト": { "url": details.website },
            "lat": { "number": details.location.map(|l| l.lat) },
            "lng": { "number": details.location.map(|l| l.lng) },
            "place_id": { "rich_text": [{ "text": { "content": details.place_id } }] },
            "印象": { "rich_text": [{ "text": { "content": store.summary } }] },
            "感想": { "rich_text": [{ "text": { "content": store.comment.clone().unwrap_or_default() } }] },
            "店タイプ": { "select": { "name": store.store_type.kind } },
            "サブタイプ": { "rich_text": [{ "text": { "content": store.store_type.subtype } }] },
            "おすすめメニュー": { "rich_text": [{ "text": { "content": store.recommendations.join(", ") } }] },
            "Tags": { "multi_select": tags },
            "保存日": { "date": { "start": Utc::now().date_naive().to_string() } },
        })
    }

    fn parse_record(page: &Value) -> Option<StoredRecord> {
        let props = &page["properties"];

        let name = props["店名"]["title"]
            .as_array()
            .and_then(|t| t.first())
            .and_then(|t| t["text"]["content"].as_str())
            .unwrap_or_default()
            .to_string();

        let lat = props["lat"]["number"].as_f64();
        let lng = props["lng"]["number"].as_f64();
        let location = match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };

        let tags: BTreeSet<String> = props["Tags"]["multi_select"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|t| t["name"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(StoredRecord {
            record_id: RecordId(page["id"].as_str()?.to_string()),
            place_id: rich_text(props, "place_id"),
            name,
            location,
            rating: props["評価"]["number"].as_f64(),
            personal_rating: props["個人評価"]["number"].as_f64(),
            price_level: props["料金"]["number"].as_u64().map(|p| p as u8),
            tags,
            store_type: StoreType {
                kind: props["店タイプ"]["select"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                subtype: rich_text(props, "サブタイプ"),
            },
            summary: rich_text(props, "印象"),
        })
    }
}

fn rich_text(props: &Value, property: &str) -> String {
    props[property]["rich_text"]
        .as_array()
        .and_then(|t| t.first())
        .and_then(|t| t["text"]["content"].as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl RecordStore for NotionRecords {
    async fn upsert(&self, store: &EnrichedStore) -> Result<RecordId> {
        let props = Self::properties(store);

        if let Some(record_id) = self.find_page_by_place_id(store.place_id()).await? {
            let url = format!("{}/v1/pages/{}", self.base_url, record_id.0);
            self.request(reqwest::Method::PATCH, url)
                .json(&json!({ "properties": props }))
                .send()
                .await?
                .error_for_status()?;
            return Ok(record_id);
        }

        let url = format!("{}/v1/pages", self.base_url);
        let response: Value = self
            .request(reqwest::Method::POST, url)
            .json(&json!({
                "parent": { "database_id": self.database_id },
                "properties": props
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["id"]
            .as_str()
            .map(|id| RecordId(id.to_string()))
            .ok_or_else(|| {
                UmamiError::Collaborator("Record store response contained no page id".to_string())
            })
    }

    fn record_url(&self, record_id: &RecordId) -> String {
        format!("https://www.notion.so/{}", record_id.0.replace('-', ""))
    }

    async fn list_all(&self) -> Result<Vec<StoredRecord>> {
        let url = format!(
            "{}/v1/databases/{}/query",
            self.base_url, self.database_id
        );

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = match &cursor {
                Some(cursor) => json!({ "start_cursor": cursor }),
                None => json!({}),
            };

            let response: Value = self
                .request(reqwest::Method::POST, url.clone())
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if let Some(pages) = response["results"].as_array() {
                records.extend(pages.iter().filter_map(Self::parse_record));
            }

            if !response["has_more"].as_bool().unwrap_or(false) {
                break;
            }
            cursor = response["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }
}
