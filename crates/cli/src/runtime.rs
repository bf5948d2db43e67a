//! Wiring shared by every command: config → store → credentials →
//! catalog client → pipeline.

use pickroute_config::AppConfig;
use pickroute_core::DocumentStore;
use pickroute_engine::{AssignmentPipeline, PipelineOptions};
use pickroute_remote::{CatalogClient, CredentialCache, OAuthRefresher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub credentials: Arc<CredentialCache>,
    pub pipeline: Arc<AssignmentPipeline>,
}

impl Runtime {
    pub async fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        Self::build(config).await
    }

    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store_path = config.store.resolved_path();
        let store = pickroute_store::open(&config.store.backend, &store_path).await?;
        debug!(backend = store.name(), path = %store_path.display(), "Store opened");

        let timeout = Duration::from_secs(config.remote.timeout_secs);
        let refresher = Arc::new(OAuthRefresher::new(config.auth.refresh_url.clone(), timeout)?);
        let credentials = Arc::new(
            CredentialCache::new(store.clone(), refresher)
                .with_bootstrap_refresh_token(config.auth.bootstrap_refresh_token.clone()),
        );
        let catalog = Arc::new(CatalogClient::new(credentials.clone(), timeout)?);

        let pipeline = Arc::new(AssignmentPipeline::new(
            store.clone(),
            catalog,
            PipelineOptions {
                export_dir: PathBuf::from(&config.sync.export_dir),
                dry_run: config.sync.dry_run,
            },
        ));

        Ok(Self {
            config,
            store,
            credentials,
            pipeline,
        })
    }
}
