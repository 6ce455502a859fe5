//! Discord adapter: interaction webhook decoding and channel pushes.
//!
//! Slash commands and component clicks arrive over the interactions
//! webhook; replies go out as regular channel messages through the bot
//! token, matching the deferred delivery model of the controller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::DiscordConfig;
use crate::error::{Result, UmamiError};
use crate::models::{Event, GeoPoint, PromptChoice, StoreCard};
use crate::port::ChatPort;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
/// One action row holds at most five buttons.
const MAX_BUTTONS: usize = 5;
const PUSH_TIMEOUT_SECS: u64 = 10;

const INTERACTION_PING: u8 = 1;
const INTERACTION_COMMAND: u8 = 2;
const INTERACTION_COMPONENT: u8 = 3;

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub interaction_type: u8,
    pub channel_id: Option<String>,
    pub member: Option<Member>,
    pub user: Option<User>,
    pub data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionData {
    pub name: Option<String>,
    pub custom_id: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub value: Option<Value>,
}

/// What a decoded interaction asks the service to do.
#[derive(Debug)]
pub enum DiscordAction {
    Ping,
    Inbound {
        user_key: String,
        event: Event,
    },
    Save {
        user_key: String,
        query: String,
        comment: Option<String>,
    },
}

/// Decode one interaction. User keys are `discord:{channel}:{user}` so
/// the push side knows which channel to write back into.
pub fn decode(interaction: Interaction) -> Option<DiscordAction> {
    if interaction.interaction_type == INTERACTION_PING {
        return Some(DiscordAction::Ping);
    }

    let user_id = interaction
        .member
        .and_then(|m| m.user)
        .or(interaction.user)?
        .id;
    let channel_id = interaction.channel_id?;
    let user_key = format!("discord:{channel_id}:{user_id}");
    let data = interaction.data?;

    match interaction.interaction_type {
        INTERACTION_COMMAND => {
            let name = data.name.as_deref()?;
            let option = |wanted: &str| {
                data.options
                    .iter()
                    .find(|o| o.name == wanted)
                    .and_then(|o| o.value.as_ref())
            };
            match name {
                "save" => {
                    let query = option("query").and_then(Value::as_str)?.to_string();
                    let comment = option("comment")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    Some(DiscordAction::Save {
                        user_key,
                        query,
                        comment,
                    })
                }
                "search" => {
                    let text = option("text").and_then(Value::as_str)?.to_string();
                    Some(DiscordAction::Inbound {
                        user_key,
                        event: Event::FreeText { text },
                    })
                }
                "nearby" => Some(DiscordAction::Inbound {
                    user_key,
                    event: Event::NearbyRequest,
                }),
                "locate" => {
                    let lat = option("latitude").and_then(Value::as_f64)?;
                    let lng = option("longitude").and_then(Value::as_f64)?;
                    Some(DiscordAction::Inbound {
                        user_key,
                        event: Event::Location {
                            point: GeoPoint { lat, lng },
                        },
                    })
                }
                _ => {
                    tracing::warn!(command = name, "unknown slash command");
                    None
                }
            }
        }
        INTERACTION_COMPONENT => {
            let custom_id = data.custom_id?;
            match serde_json::from_str::<Event>(&custom_id) {
                Ok(event) => Some(DiscordAction::Inbound { user_key, event }),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable component id");
                    None
                }
            }
        }
        _ => None,
    }
}

/// Pushes messages into Discord channels. Choice buttons become
/// message components whose custom id is the serialized event.
pub struct DiscordPush {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl DiscordPush {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        Self::with_base_url(config, DISCORD_API_BASE)
    }

    pub fn with_base_url(config: &DiscordConfig, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    /// The router hands us the key without its surface prefix, so the
    /// channel is everything before the first colon.
    fn channel_of(user_id: &str) -> Result<&str> {
        user_id
            .split(':')
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| UmamiError::Validation(format!("malformed Discord key: {user_id}")))
    }

    async fn post_message(&self, channel_id: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(format!(
                "{}/channels/{channel_id}/messages",
                self.base_url
            ))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(UmamiError::Collaborator(format!(
                "Discord push failed: {status} {text}"
            )));
        }
        Ok(())
    }
}

fn components(choices: &[PromptChoice]) -> Option<Value> {
    if choices.is_empty() {
        return None;
    }
    let buttons: Vec<Value> = choices
        .iter()
        .take(MAX_BUTTONS)
        .filter_map(|choice| {
            let custom_id = serde_json::to_string(&choice.event).ok()?;
            Some(json!({
                "type": 2,
                "style": 2,
                "label": choice.label,
                "custom_id": custom_id,
            }))
        })
        .collect();
    Some(json!([{ "type": 1, "components": buttons }]))
}

fn card_embed(card: &StoreCard) -> Value {
    let mut description = Vec::new();
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
            description.push(line.clone());
        }
    }
    if !card.body.is_empty() {
        description.push(String::new());
        description.push(card.body.clone());
    }

    let mut embed = json!({
        "title": card.title,
        "description": description.join("\n"),
    });
    if let Some(link) = &card.link {
        embed["url"] = json!(link);
    }
    if let Some(photo_url) = &card.photo_url {
        embed["image"] = json!({ "url": photo_url });
    }
    embed
}

#[async_trait]
impl ChatPort for DiscordPush {
    async fn send_prompt(
        &self,
        user_id: &str,
        text: &str,
        choices: &[PromptChoice],
    ) -> Result<()> {
        let channel_id = Self::channel_of(user_id)?;
        let mut body = json!({ "content": text });
        if let Some(components) = components(choices) {
            body["components"] = components;
        }
        self.post_message(channel_id, body).await
    }

    async fn send_card(&self, user_id: &str, card: &StoreCard) -> Result<()> {
        let channel_id = Self::channel_of(user_id)?;
        let mut body = json!({ "embeds": [card_embed(card)] });
        if let Some(components) = components(&card.choices) {
            body["components"] = components;
        }
        self.post_message(channel_id, body).await
    }

    async fn send_confirmation(&self, user_id: &str, text: &str, link: &str) -> Result<()> {
        let channel_id = Self::channel_of(user_id)?;
        self.post_message(channel_id, json!({ "content": format!("{text}\n{link}") }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interaction(json: Value) -> Interaction {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_decode_ping() {
        let action = decode(interaction(json!({ "type": 1 })));
        assert!(matches!(action, Some(DiscordAction::Ping)));
    }

    #[test]
    fn test_decode_save_command() {
        let action = decode(interaction(json!({
            "type": 2,
            "channel_id": "C1",
            "member": { "user": { "id": "U1" } },
            "data": {
                "name": "save",
                "options": [
                    { "name": "query", "value": "鮨さいとう" },
                    { "name": "comment", "value": "また行きたい" },
                ],
            },
        })));

        match action {
            Some(DiscordAction::Save {
                user_key,
                query,
                comment,
            }) => {
                assert_eq!(user_key, "discord:C1:U1");
                assert_eq!(query, "鮨さいとう");
                assert_eq!(comment.as_deref(), Some("また行きたい"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decode_component_click() {
        let custom_id = serde_json::to_string(&Event::AcceptNoComment).unwrap();
        let action = decode(interaction(json!({
            "type": 3,
            "channel_id": "C1",
            "user": { "id": "U1" },
            "data": { "custom_id": custom_id },
        })));

        match action {
            Some(DiscordAction::Inbound { user_key, event }) => {
                assert_eq!(user_key, "discord:C1:U1");
                assert_eq!(event, Event::AcceptNoComment);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let action = decode(interaction(json!({
            "type": 2,
            "channel_id": "C1",
            "user": { "id": "U1" },
            "data": { "name": "frobnicate" },
        })));
        assert!(action.is_none());
    }

    #[test]
    fn test_channel_of_splits_key() {
        assert_eq!(DiscordPush::channel_of("C1:U1").unwrap(), "C1");
        assert!(DiscordPush::channel_of(":U1").is_err());
    }

    #[test]
    fn test_components_caps_at_one_row() {
        let choices: Vec<PromptChoice> = (0..8)
            .map(|i| PromptChoice {
                label: format!("c{i}"),
                event: Event::Select {
                    place_id: format!("p{i}"),
                },
            })
            .collect();

        let rows = components(&choices).unwrap();
        assert_eq!(
            rows[0]["components"].as_array().unwrap().len(),
            MAX_BUTTONS
        );
    }
}
