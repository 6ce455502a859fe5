use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub notion: NotionConfig,
    pub llm: Option<LlmConfig>,
    pub line: Option<LineConfig>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
    /// Language code passed to the Places/Geocoding APIs.
    pub language: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
    /// Notion-Version header value.
    pub api_version: String,
    pub timeout_secs: u64,
}

/// LLM configuration for the enrichment completions
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    pub channel_access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("UMAMI_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("UMAMI_PORT", 8080),
            },
            google: GoogleConfig {
                api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
                language: env::var("GOOGLE_LANGUAGE").unwrap_or_else(|_| "ja".to_string()),
                timeout_secs: parse_env_or("GOOGLE_TIMEOUT", 10),
            },
            notion: NotionConfig {
                api_key: env::var("NOTION_API_KEY").unwrap_or_default(),
                database_id: env::var("MAIN_DATABASE_ID").unwrap_or_default(),
                api_version: env::var("NOTION_VERSION")
                    .unwrap_or_else(|_| "2022-06-28".to_string()),
                timeout_secs: parse_env_or("NOTION_TIMEOUT", 15),
            },
            llm: env::var("LLM_MODEL")
                .ok()
                .or_else(|| env::var("OPENAI_API_KEY").ok().map(|_| "gpt-4o-mini".into()))
                .map(|model| LlmConfig {
                    model,
                    api_key: env::var("LLM_API_KEY")
                        .or_else(|_| env::var("OPENAI_API_KEY"))
                        .ok(),
                    base_url: env::var("LLM_BASE_URL").ok(),
                    timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                    max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
                }),
            line: env::var("LINE_CHANNEL_ACCESS_TOKEN")
                .ok()
                .map(|channel_access_token| LineConfig {
                    channel_access_token,
                }),
            discord: env::var("DISCORD_BOT_TOKEN")
                .ok()
                .map(|bot_token| DiscordConfig { bot_token }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
