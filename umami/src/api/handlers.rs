use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::{discord, line, AppState};
use crate::error::Result;
use crate::models::Event;

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "umami" }))
}

/// LINE retries deliveries that do not return 200 quickly, so failures
/// are logged and swallowed rather than surfaced as error statuses.
pub async fn line_webhook(
    State(state): State<AppState>,
    Json(payload): Json<line::WebhookPayload>,
) -> StatusCode {
    for (user_key, event) in line::decode_events(payload) {
        if let Err(e) = dispatch(&state, &user_key, event).await {
            tracing::error!(user_key, error = %e, "event handling failed");
        }
    }
    StatusCode::OK
}

/// Interaction responses are deferred; actual replies arrive as
/// channel pushes through the bot token.
pub async fn discord_webhook(
    State(state): State<AppState>,
    Json(interaction): Json<discord::Interaction>,
) -> Result<Json<Value>> {
    match discord::decode(interaction) {
        Some(discord::DiscordAction::Ping) => Ok(Json(json!({ "type": 1 }))),
        Some(discord::DiscordAction::Save {
            user_key,
            query,
            comment,
        }) => {
            state
                .controller
                .handle_save_command(&user_key, &query, comment)
                .await?;
            Ok(Json(json!({ "type": 5 })))
        }
        Some(discord::DiscordAction::Inbound { user_key, event }) => {
            dispatch(&state, &user_key, event).await?;
            Ok(Json(json!({ "type": 5 })))
        }
        None => Ok(Json(json!({ "type": 5 }))),
    }
}

/// Shared text-command layer: slash-style commands work from any
/// surface before the conversational state machine sees the text.
async fn dispatch(state: &AppState, user_key: &str, event: Event) -> Result<()> {
    let event = match event {
        Event::FreeText { text } => match parse_command(&text) {
            Some(Command::Save { query, comment }) => {
                return state
                    .controller
                    .handle_save_command(user_key, &query, comment)
                    .await;
            }
            Some(Command::Nearby) => Event::NearbyRequest,
            None => Event::FreeText { text },
        },
        other => other,
    };

    state.controller.handle_event(user_key, event).await
}

enum Command {
    Save {
        query: String,
        comment: Option<String>,
    },
    Nearby,
}

/// `/save <query>` or `/save <query> | <comment>`, and `/nearby`.
fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if trimmed == "/nearby" {
        return Some(Command::Nearby);
    }

    let rest = trimmed.strip_prefix("/save")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (query, comment) = match rest.split_once('|') {
        Some((query, comment)) => {
            let comment = comment.trim();
            (
                query.trim().to_string(),
                (!comment.is_empty()).then(|| comment.to_string()),
            )
        }
        None => (rest.to_string(), None),
    };
    if query.is_empty() {
        return None;
    }
    Some(Command::Save { query, comment })
}
