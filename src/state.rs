use std::sync::Arc;

use crate::auth::{TokenError, TokenVerifier};
use crate::client::BotClient;
use crate::config::AppConfig;
use crate::fallback::SpaRenderer;

/// Shared application state handed to every route, guard and hook.
///
/// Everything here is read-only once the server starts.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub client: Arc<dyn BotClient>,
    pub spa: Arc<dyn SpaRenderer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        client: Arc<dyn BotClient>,
        spa: Arc<dyn SpaRenderer>,
    ) -> Result<Self, TokenError> {
        let verifier = TokenVerifier::new(&config.security)?;
        Ok(Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            client,
            spa,
        })
    }
}
