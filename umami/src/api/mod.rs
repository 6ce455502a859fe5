mod discord;
mod handlers;
mod line;
mod push;
mod routes;
mod state;

pub use discord::DiscordPush;
pub use line::LinePush;
pub use push::SurfaceRouter;
pub use routes::create_router;
pub use state::AppState;
