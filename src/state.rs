use std::sync::Arc;

use crate::config::Config;
use crate::rag::RagEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rag: Arc<RagEngine>,
    /// Bounds how many queries are answered at once
    pub request_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            rag: Arc::new(RagEngine::new(config.clone(), http_client)),
            request_semaphore: Arc::new(tokio::sync::Semaphore::new(
                config.max_concurrent_requests,
            )),
            config,
        })
    }
}
