//! `ObjectSink` on top of `object_store`.
//!
//! The storage URL picks the backend:
//! - `gs://` Google Cloud Storage, one client per target bucket, credentials
//!   from the standard `GOOGLE_*` environment variables;
//! - `memory://` a process-local in-memory store (dry wiring, tests);
//! - `file:///some/dir` a local directory, one sub-directory per bucket.

use async_trait::async_trait;
use bytes::Bytes;
use hatchery_core::storage::{ObjectSink, ObjectWriter};
use hatchery_core::{Error, Result};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

const GCS_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
enum Backend {
    Gcs,
    Memory(Arc<InMemory>),
    Local(PathBuf),
}

pub struct ObjectStoreSink {
    backend: Backend,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreSink {
    #[instrument(level = "debug")]
    pub fn from_url(url: &str) -> Result<Self> {
        let backend = match url.trim() {
            "" | "gs://" | "gcs://" => Backend::Gcs,
            "memory://" => Backend::Memory(Arc::new(InMemory::new())),
            other => match other.strip_prefix("file://") {
                Some(dir) if !dir.is_empty() => Backend::Local(PathBuf::from(dir)),
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "unsupported storage url {other:?} (expected gs://, memory:// or file:///dir)"
                    )));
                }
            },
        };
        Ok(Self {
            backend,
            stores: Mutex::new(HashMap::new()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(InMemory::new())),
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn scheme(&self) -> &'static str {
        match self.backend {
            Backend::Gcs => "gs",
            Backend::Memory(_) => "memory",
            Backend::Local(_) => "file",
        }
    }

    /// Store and object path for `bucket`/`key`.
    async fn resolve(&self, bucket: &str, key: &str) -> Result<(Arc<dyn ObjectStore>, Path)> {
        if bucket.trim().is_empty() {
            return Err(Error::InvalidInput("bucket is empty".to_string()));
        }
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(bucket) {
            return Ok((store.clone(), self.object_path(bucket, key)?));
        }
        let store = self.open(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok((store, self.object_path(bucket, key)?))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<Path> {
        let raw = match self.backend {
            Backend::Gcs => key.to_string(),
            Backend::Memory(_) | Backend::Local(_) => format!("{bucket}/{key}"),
        };
        Path::parse(&raw).map_err(|e| Error::storage(format!("object key {raw:?}"), e))
    }

    #[instrument(level = "debug", skip(self))]
    fn open(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        match &self.backend {
            Backend::Gcs => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .with_client_options(ClientOptions::new().with_timeout(GCS_REQUEST_TIMEOUT))
                    .build()
                    .map_err(|e| Error::storage(format!("open gs://{bucket}"), e))?;
                Ok(Arc::new(store))
            }
            Backend::Memory(store) => Ok(store.clone()),
            Backend::Local(root) => {
                std::fs::create_dir_all(root)
                    .map_err(|e| Error::storage(format!("create {}", root.display()), e))?;
                let store = LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| Error::storage(format!("open {}", root.display()), e))?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[async_trait]
impl ObjectSink for ObjectStoreSink {
    async fn new_writer(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectWriter>> {
        let (store, path) = self.resolve(bucket, key).await?;
        Ok(Box::new(BufferedWriter {
            store,
            path,
            uri: format!("{}://{bucket}/{key}", self.scheme()),
            buf: Vec::new(),
        }))
    }
}

/// Buffers the whole object and uploads it in one `put` on close.
struct BufferedWriter {
    store: Arc<dyn ObjectStore>,
    path: Path,
    uri: String,
    buf: Vec<u8>,
}

#[async_trait]
impl ObjectWriter for BufferedWriter {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(uri = %self.uri, bytes = self.buf.len()))]
    async fn close(self: Box<Self>) -> Result<()> {
        let BufferedWriter {
            store,
            path,
            uri,
            buf,
        } = *self;
        store
            .put(&path, Bytes::from(buf).into())
            .await
            .map_err(|e| Error::storage(format!("put {uri}"), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips_through_object_store() {
        let sink = ObjectStoreSink::from_url("memory://").unwrap();
        let mut w = sink
            .new_writer("audit", "logs/2024/01/02/03/x.json.gz")
            .await
            .unwrap();
        w.write(b"abc").await.unwrap();
        w.write(b"def").await.unwrap();
        w.close().await.unwrap();

        let (store, path) = sink
            .resolve("audit", "logs/2024/01/02/03/x.json.gz")
            .await
            .unwrap();
        assert_eq!(path.as_ref(), "audit/logs/2024/01/02/03/x.json.gz");
        let got = store.get(&path).await.unwrap().bytes().await.unwrap();
        assert_eq!(got.as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn unclosed_writer_publishes_nothing() {
        let sink = ObjectStoreSink::in_memory();
        let mut w = sink.new_writer("audit", "k").await.unwrap();
        w.write(b"abc").await.unwrap();
        drop(w);
        let (store, path) = sink.resolve("audit", "k").await.unwrap();
        assert!(store.get(&path).await.is_err());
    }

    /// Needs `GOOGLE_APPLICATION_CREDENTIALS` (or another `GOOGLE_*`
    /// credential variable) and a writable bucket in `HATCHERY_TEST_GCS_BUCKET`.
    #[tokio::test]
    #[ignore]
    async fn gcs_put_with_env_credentials() {
        let bucket = std::env::var("HATCHERY_TEST_GCS_BUCKET").unwrap();
        let sink = ObjectStoreSink::from_url("gs://").unwrap();
        let mut w = sink
            .new_writer(&bucket, "hatchery-test/logs/probe.json.gz")
            .await
            .unwrap();
        w.write(b"{}").await.unwrap();
        w.close().await.unwrap();
    }

    #[test]
    fn url_parsing() {
        assert!(matches!(ObjectStoreSink::from_url("gs://").unwrap().backend, Backend::Gcs));
        assert!(matches!(
            ObjectStoreSink::from_url("file:///tmp/hatchery").unwrap().backend,
            Backend::Local(_)
        ));
        assert!(ObjectStoreSink::from_url("ftp://nope").is_err());
        assert!(ObjectStoreSink::from_url("file://").is_err());
    }
}
