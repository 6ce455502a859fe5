//! Outbound side of a chat surface.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{OutboundMessage, PromptChoice, StoreCard};

/// What the controller needs from a chat surface: deliver text prompts
/// (optionally with choice buttons), structured store cards, and save
/// confirmations with a link. Rendering is the surface's concern.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_prompt(&self, user_id: &str, text: &str, choices: &[PromptChoice])
        -> Result<()>;

    async fn send_card(&self, user_id: &str, card: &StoreCard) -> Result<()>;

    async fn send_confirmation(&self, user_id: &str, text: &str, link: &str) -> Result<()>;

    async fn deliver(&self, user_id: &str, message: &OutboundMessage) -> Result<()> {
        match message {
            OutboundMessage::Prompt { text, choices } => {
                self.send_prompt(user_id, text, choices).await
            }
            OutboundMessage::Card(card) => self.send_card(user_id, card).await,
            OutboundMessage::Confirmation { text, link } => {
                self.send_confirmation(user_id, text, link).await
            }
        }
    }
}
