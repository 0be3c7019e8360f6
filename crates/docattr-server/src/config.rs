use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docattr_core::PipelineConfig;
use docattr_store::{BlobStore, FsBlobStore, InMemoryBlobStore, KeyScheme};
use serde::{Deserialize, Serialize};

use crate::admission::AdmissionConfig;
use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub admission: AdmissionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            max_body_bytes: 16 * 1024 * 1024,
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Objects live in process memory and are lost on exit.
    Memory,
    #[default]
    Fs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub root: PathBuf,
    pub bucket: String,
    /// Optional key prefix shared by every object, e.g. `y:v1`.
    pub namespace: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            root: PathBuf::from("./data"),
            bucket: "docattr".to_string(),
            namespace: None,
        }
    }
}

impl StoreConfig {
    pub async fn open(&self) -> ServerResult<Arc<dyn BlobStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Arc::new(InMemoryBlobStore::new()),
            StoreBackend::Fs => Arc::new(FsBlobStore::open(&self.root, &self.bucket).await?),
        })
    }

    pub fn key_scheme(&self) -> ServerResult<KeyScheme> {
        match &self.namespace {
            Some(ns) => Ok(KeyScheme::with_namespace(ns.clone())?),
            None => Ok(KeyScheme::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_bytes, 16 * 1024 * 1024);
        assert_eq!(c.store.backend, StoreBackend::Fs);
        assert_eq!(c.pipeline.workers, 3);
        assert!(c.store.namespace.is_none());
    }

    #[test]
    fn parse_full_file() {
        let c: ServerConfig = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:8080"

            [store]
            backend = "memory"
            namespace = "y:v1"

            [pipeline]
            min_cache_time_ms = 100
            max_attempts = 4

            [admission]
            headroom_factor = 10
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.store.backend, StoreBackend::Memory);
        assert_eq!(c.store.bucket, "docattr");
        assert_eq!(c.pipeline.min_cache_time_ms, 100);
        assert_eq!(c.pipeline.retry.max_attempts, Some(4));
        assert_eq!(c.admission.headroom_factor, 10);
        assert_eq!(
            c.store.key_scheme().unwrap().namespace(),
            Some("y:v1")
        );
    }

    #[test]
    fn toml_roundtrip() {
        let c = ServerConfig::default();
        let back: ServerConfig = toml::from_str(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "bind_addr = 12").unwrap();
        let err = ServerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[tokio::test]
    async fn open_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let blobs = store.open().await.unwrap();
        blobs.put("k", vec![1]).await.unwrap();
        assert!(dir.path().join("docattr").join("k").exists());
    }
}
