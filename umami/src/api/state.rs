use std::sync::Arc;

use crate::config::Config;
use crate::controller::ConversationController;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: ConversationController,
}

impl AppState {
    pub fn new(config: Config, controller: ConversationController) -> Self {
        Self {
            config: Arc::new(config),
            controller,
        }
    }
}
