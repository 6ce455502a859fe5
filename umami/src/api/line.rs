//! LINE messaging adapter: webhook decoding and push delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::LineConfig;
use crate::error::{Result, UmamiError};
use crate::models::{Event, GeoPoint, PromptChoice, StoreCard};
use crate::port::ChatPort;

const LINE_API_BASE: &str = "https://api.line.me";
/// LINE caps quick reply items at 13.
const MAX_QUICK_REPLIES: usize = 13;
const PUSH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: Option<EventSource>,
    pub message: Option<MessagePayload>,
    pub postback: Option<PostbackPayload>,
}

#[derive(Debug, Deserialize)]
pub struct EventSource {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PostbackPayload {
    pub data: String,
}

/// Decode a webhook delivery into `(user key, event)` pairs, dropping
/// anything we do not understand. Keys carry the `line:` surface
/// prefix so replies can be routed back here.
pub fn decode_events(payload: WebhookPayload) -> Vec<(String, Event)> {
    let mut decoded = Vec::new();
    for event in payload.events {
        let Some(user_id) = event.source.and_then(|s| s.user_id) else {
            continue;
        };
        let key = format!("line:{user_id}");
        match event.event_type.as_str() {
            "message" => {
                let Some(message) = event.message else {
                    continue;
                };
                match message.message_type.as_str() {
                    "text" => {
                        if let Some(text) = message.text {
                            decoded.push((key, Event::FreeText { text }));
                        }
                    }
                    "location" => {
                        if let (Some(lat), Some(lng)) = (message.latitude, message.longitude) {
                            decoded.push((
                                key,
                                Event::Location {
                                    point: GeoPoint { lat, lng },
                                },
                            ));
                        }
                    }
                    _ => {}
                }
            }
            "postback" => {
                let Some(postback) = event.postback else {
                    continue;
                };
                match serde_json::from_str::<Event>(&postback.data) {
                    Ok(event) => decoded.push((key, event)),
                    Err(e) => tracing::warn!(error = %e, "undecodable postback data"),
                }
            }
            _ => {}
        }
    }
    decoded
}

/// Pushes messages through the LINE Messaging API. Choice buttons
/// become quick reply postbacks whose data is the serialized event.
pub struct LinePush {
    client: reqwest::Client,
    base_url: String,
    channel_access_token: String,
}

impl LinePush {
    pub fn new(config: &LineConfig) -> Result<Self> {
        Self::with_base_url(config, LINE_API_BASE)
    }

    pub fn with_base_url(config: &LineConfig, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            channel_access_token: config.channel_access_token.clone(),
        })
    }

    async fn push(&self, to: &str, messages: Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(&self.channel_access_token)
            .json(&json!({ "to": to, "messages": messages }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UmamiError::Collaborator(format!(
                "LINE push failed: {status} {body}"
            )));
        }
        Ok(())
    }

    fn text_message(text: &str, choices: &[PromptChoice]) -> Value {
        let mut message = json!({ "type": "text", "text": text });
        if let Some(quick_reply) = quick_reply(choices) {
            message["quickReply"] = quick_reply;
        }
        message
    }
}

fn quick_reply(choices: &[PromptChoice]) -> Option<Value> {
    if choices.is_empty() {
        return None;
    }
    let items: Vec<Value> = choices
        .iter()
        .take(MAX_QUICK_REPLIES)
        .filter_map(|choice| {
            let data = serde_json::to_string(&choice.event).ok()?;
            Some(json!({
                "type": "action",
                "action": {
                    "type": "postback",
                    "label": choice.label,
                    "data": data,
                    "displayText": choice.label,
                },
            }))
        })
        .collect();
    Some(json!({ "items": items }))
}

fn card_text(card: &StoreCard) -> String {
    let mut lines = vec![card.title.clone()];
    for line in [
        &card.address,
        &card.rating_line,
        &card.price_line,
        &card.type_line,
        &card.subtype_line,
        &card.tags_line,
        &card.recommendations_line,
    ] {
        if !line.is_empty() {
            lines.push(line.clone());
        }
    }
    if !card.body.is_empty() {
        lines.push(String::new());
        lines.push(card.body.clone());
    }
    if let Some(link) = &card.link {
        lines.push(String::new());
        lines.push(link.clone());
    }
    lines.join("\n")
}

#[async_trait]
impl ChatPort for LinePush {
    async fn send_prompt(
        &self,
        user_id: &str,
        text: &str,
        choices: &[PromptChoice],
    ) -> Result<()> {
        self.push(user_id, json!([Self::text_message(text, choices)]))
            .await
    }

    async fn send_card(&self, user_id: &str, card: &StoreCard) -> Result<()> {
        let mut messages = Vec::new();
        if let Some(photo_url) = &card.photo_url {
            messages.push(json!({
                "type": "image",
                "originalContentUrl": photo_url,
                "previewImageUrl": photo_url,
            }));
        }
        messages.push(Self::text_message(&card_text(card), &card.choices));
        self.push(user_id, Value::Array(messages)).await
    }

    async fn send_confirmation(&self, user_id: &str, text: &str, link: &str) -> Result<()> {
        let body = format!("{text}\n{link}");
        self.push(user_id, json!([Self::text_message(&body, &[])]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(json: Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_decode_text_message() {
        let decoded = decode_events(payload(json!({
            "events": [{
                "type": "message",
                "source": { "userId": "U123" },
                "message": { "type": "text", "text": "ラーメン 渋谷" },
            }]
        })));

        assert_eq!(
            decoded,
            vec![(
                "line:U123".to_string(),
                Event::FreeText {
                    text: "ラーメン 渋谷".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_decode_location_message() {
        let decoded = decode_events(payload(json!({
            "events": [{
                "type": "message",
                "source": { "userId": "U123" },
                "message": { "type": "location", "latitude": 35.66, "longitude": 139.70 },
            }]
        })));

        assert_eq!(decoded.len(), 1);
        assert_eq!(
            decoded[0].1,
            Event::Location {
                point: GeoPoint {
                    lat: 35.66,
                    lng: 139.70
                }
            }
        );
    }

    #[test]
    fn test_decode_postback_event() {
        let data = serde_json::to_string(&Event::Select {
            place_id: "abc".to_string(),
        })
        .unwrap();
        let decoded = decode_events(payload(json!({
            "events": [{
                "type": "postback",
                "source": { "userId": "U123" },
                "postback": { "data": data },
            }]
        })));

        assert_eq!(
            decoded,
            vec![(
                "line:U123".to_string(),
                Event::Select {
                    place_id: "abc".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_decode_drops_unknown_and_sourceless_events() {
        let decoded = decode_events(payload(json!({
            "events": [
                { "type": "follow", "source": { "userId": "U123" } },
                { "type": "message", "message": { "type": "text", "text": "hi" } },
                { "type": "postback", "source": { "userId": "U123" }, "postback": { "data": "not json" } },
            ]
        })));

        assert!(decoded.is_empty());
    }

    #[test]
    fn test_quick_reply_respects_line_limit() {
        let choices: Vec<PromptChoice> = (0..20)
            .map(|i| PromptChoice {
                label: format!("choice {i}"),
                event: Event::Select {
                    place_id: format!("p{i}"),
                },
            })
            .collect();

        let reply = quick_reply(&choices).unwrap();
        assert_eq!(reply["items"].as_array().unwrap().len(), MAX_QUICK_REPLIES);
    }
}
