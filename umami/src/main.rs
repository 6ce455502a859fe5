use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use umami::analysis::LlmAnalyzer;
use umami::api::{create_router, AppState, DiscordPush, LinePush, SurfaceRouter};
use umami::config::Config;
use umami::controller::ConversationController;
use umami::enrich::EnrichmentOrchestrator;
use umami::llm::LlmProvider;
use umami::places::GooglePlaces;
use umami::port::ChatPort;
use umami::records::NotionRecords;
use umami::session::SessionStore;

#[derive(Parser)]
#[command(name = "umami")]
#[command(about = "Conversational restaurant memory bot")]
struct Args {
    /// Bind address override (host:port)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "umami=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.google.api_key.is_empty() {
        tracing::warn!("GOOGLE_API_KEY is not set - place search will fail");
    }
    if config.notion.api_key.is_empty() || config.notion.database_id.is_empty() {
        tracing::warn!("NOTION_API_KEY or MAIN_DATABASE_ID is not set - saving will fail");
    }

    let places = Arc::new(GooglePlaces::new(&config.google)?);
    let records = Arc::new(NotionRecords::new(&config.notion)?);

    if let Some(llm_config) = &config.llm {
        tracing::info!("Initializing LLM provider: {}...", llm_config.model);
    }
    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - store analysis will be skipped");
    }
    let analyzer = Arc::new(LlmAnalyzer::new(llm));

    let line = match &config.line {
        Some(line_config) => {
            tracing::info!("LINE surface enabled");
            Some(LinePush::new(line_config)?)
        }
        None => None,
    };
    let discord = match &config.discord {
        Some(discord_config) => {
            tracing::info!("Discord surface enabled");
            Some(DiscordPush::new(discord_config)?)
        }
        None => None,
    };
    if line.is_none() && discord.is_none() {
        tracing::warn!(
            "No chat surface configured - set LINE_CHANNEL_ACCESS_TOKEN or DISCORD_BOT_TOKEN"
        );
    }
    let port: Arc<dyn ChatPort> = Arc::new(SurfaceRouter::new(line, discord));

    let enricher = EnrichmentOrchestrator::new(places.clone(), analyzer);
    let sessions = Arc::new(SessionStore::new());
    let photo_api_key = (!config.google.api_key.is_empty()).then(|| config.google.api_key.clone());
    let controller = ConversationController::new(
        sessions,
        places,
        records,
        enricher,
        port,
        photo_api_key,
    );

    let addr = match &args.bind {
        Some(bind) => bind.clone(),
        None => format!("{}:{}", config.server.host, config.server.port),
    };

    let state = AppState::new(config, controller);
    let app = create_router(state);

    let cancel_token = CancellationToken::new();

    tracing::info!("Umami starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/healthz", addr);
    tracing::info!("  LINE webhook: http://{}/webhook/line", addr);
    tracing::info!("  Discord webhook: http://{}/webhook/discord", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight work...");
    cancel_token.cancel();
}
