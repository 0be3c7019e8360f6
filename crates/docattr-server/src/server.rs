use std::future::Future;

use docattr_core::Pipeline;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// HTTP front end plus the compaction workers behind it.
pub struct DocattrServer {
    config: ServerConfig,
    pipeline: Pipeline,
}

impl DocattrServer {
    /// Open the configured store and wire up the pipeline.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = config.store.open().await?;
        let scheme = config.store.key_scheme()?;
        let pipeline = Pipeline::new(store, scheme, config.pipeline.clone());
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(
            AppState::new(self.pipeline.clone(), self.config.admission),
            self.config.max_body_bytes,
        )
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve until `signal` resolves, then stop the workers. Attribute maps
    /// still pending in memory at that point are not persisted.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        let workers = self.pipeline.start_workers();
        tracing::info!(
            addr = %self.config.bind_addr,
            workers = workers.len(),
            "docattr server listening"
        );
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        let cache = self.pipeline.cache();
        if !cache.is_idle() {
            tracing::warn!(
                pending_docs = cache.pending_docs(),
                "shutting down with unpersisted attributions"
            );
        }
        workers.shutdown().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    fn memory_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[tokio::test]
    async fn server_construction() {
        let server = DocattrServer::new(memory_config()).await.unwrap();
        assert_eq!(server.config().pipeline.workers, 3);
        let _router = server.router();
    }

    #[tokio::test]
    async fn bad_namespace_is_a_config_error() {
        let mut config = memory_config();
        config.store.namespace = Some("trailing:".into());
        assert!(DocattrServer::new(config).await.is_err());
    }

    #[tokio::test]
    async fn serve_stops_on_signal() {
        let server = DocattrServer::new(memory_config()).await.unwrap();
        server.serve_with_shutdown(async {}).await.unwrap();
    }
}
