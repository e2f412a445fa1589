use std::sync::Arc;
use std::time::Duration;

use crate::backends::Backends;
use crate::config::Config;
use crate::indexer::IndexStatus;

/// Concurrent `/ask` requests allowed to hold a completion call.
const ASK_PERMITS: usize = 3;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backends: Backends,
    pub index_status: Arc<IndexStatus>,
    pub ask_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    /// Build the HTTP client and check every configured backend once.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        let backends = Backends::detect(&config, &http_client).await;
        Ok(Self::with_backends(config, backends))
    }

    /// State over already-built backends.
    pub fn with_backends(config: Config, backends: Backends) -> Self {
        Self {
            config: Arc::new(config),
            backends,
            index_status: Arc::new(IndexStatus::default()),
            ask_semaphore: Arc::new(tokio::sync::Semaphore::new(ASK_PERMITS)),
        }
    }
}
