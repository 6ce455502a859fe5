//! Routes outbound messages back to the surface a user key came from.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DiscordPush, LinePush};
use crate::error::{Result, UmamiError};
use crate::models::{PromptChoice, StoreCard};
use crate::port::ChatPort;

/// Dispatches on the `line:` / `discord:` prefix of the user key and
/// hands the rest of the key to the matching surface.
pub struct SurfaceRouter {
    line: Option<Arc<LinePush>>,
    discord: Option<Arc<DiscordPush>>,
}

impl SurfaceRouter {
    pub fn new(line: Option<LinePush>, discord: Option<DiscordPush>) -> Self {
        Self {
            line: line.map(Arc::new),
            discord: discord.map(Arc::new),
        }
    }

    fn route<'a>(&'a self, user_id: &'a str) -> Result<(&'a dyn ChatPort, &'a str)> {
        if let Some(rest) = user_id.strip_prefix("line:") {
            return match &self.line {
                Some(line) => Ok((line.as_ref(), rest)),
                None => Err(UmamiError::Validation(
                    "LINE surface is not configured".to_string(),
                )),
            };
        }
        if let Some(rest) = user_id.strip_prefix("discord:") {
            return match &self.discord {
                Some(discord) => Ok((discord.as_ref(), rest)),
                None => Err(UmamiError::Validation(
                    "Discord surface is not configured".to_string(),
                )),
            };
        }
        Err(UmamiError::Validation(format!(
            "unroutable user key: {user_id}"
        )))
    }
}

#[async_trait]
impl ChatPort for SurfaceRouter {
    async fn send_prompt(
        &self,
        user_id: &str,
        text: &str,
        choices: &[PromptChoice],
    ) -> Result<()> {
        let (port, rest) = self.route(user_id)?;
        port.send_prompt(rest, text, choices).await
    }

    async fn send_card(&self, user_id: &str, card: &StoreCard) -> Result<()> {
        let (port, rest) = self.route(user_id)?;
        port.send_card(rest, card).await
    }

    async fn send_confirmation(&self, user_id: &str, text: &str, link: &str) -> Result<()> {
        let (port, rest) = self.route(user_id)?;
        port.send_confirmation(rest, text, link).await
    }
}
