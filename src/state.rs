use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::{
    config::Config,
    gateway::AnthropicGateway,
    history::JsonFileStore,
    service::{PrescriptionService, SystemClock},
};

pub struct AppState {
    pub config: Config,
    pub service: PrescriptionService,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>> {
        let config = Config::load()?;

        let store = JsonFileStore::load(&config.history_path).await?;
        info!("History file: {}", store.path().display());

        let gateway = AnthropicGateway::new(&config)?;
        info!(
            "LLM gateway ready ({}), {} API tokens loaded",
            config.llm_model,
            config.tokens.len()
        );

        let service = PrescriptionService::new(
            Arc::new(store),
            Arc::new(gateway),
            Arc::new(SystemClock),
        );

        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: Config, service: PrescriptionService) -> Arc<Self> {
        Arc::new(Self { config, service })
    }
}
