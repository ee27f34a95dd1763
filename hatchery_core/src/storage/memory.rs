//! In-memory collaborators for local runs and unit tests. Every call is
//! recorded so tests can assert on exact interactions.

use super::{BytesStream, MessageQueue, ObjectSink, ObjectSource, ObjectWriter, QueueMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct SinkState {
    objects: BTreeMap<(String, String), Bytes>,
    opened: Vec<(String, String)>,
    fail_close: HashSet<String>,
    fail_open: bool,
}

/// Object sink that keeps committed objects in a map.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `close` fail for writers opened at `key`.
    pub async fn fail_close_at(&self, key: impl Into<String>) {
        self.state.lock().await.fail_close.insert(key.into());
    }

    /// Make every `new_writer` call fail.
    pub async fn fail_open(&self) {
        self.state.lock().await.fail_open = true;
    }

    /// Committed objects keyed by `(bucket, key)`.
    pub async fn objects(&self) -> BTreeMap<(String, String), Bytes> {
        self.state.lock().await.objects.clone()
    }

    /// Every `(bucket, key)` a writer was opened for, in call order.
    pub async fn opened(&self) -> Vec<(String, String)> {
        self.state.lock().await.opened.clone()
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    async fn new_writer(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectWriter>> {
        let mut state = self.state.lock().await;
        state.opened.push((bucket.to_string(), key.to_string()));
        if state.fail_open {
            return Err(Error::storage(
                format!("open gs://{bucket}/{key}"),
                std::io::Error::other("injected open failure"),
            ));
        }
        Ok(Box::new(MemoryWriter {
            state: self.state.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            buf: Vec::new(),
        }))
    }
}

struct MemoryWriter {
    state: Arc<Mutex<SinkState>>,
    bucket: String,
    key: String,
    buf: Vec<u8>,
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let MemoryWriter {
            state,
            bucket,
            key,
            buf,
        } = *self;
        let mut state = state.lock().await;
        if state.fail_close.contains(&key) {
            return Err(Error::storage(
                format!("close gs://{bucket}/{key}"),
                std::io::Error::other("injected close failure"),
            ));
        }
        state.objects.insert((bucket, key), Bytes::from(buf));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    batches: VecDeque<Vec<QueueMessage>>,
    receive_calls: Vec<Option<u32>>,
    deleted: Vec<String>,
}

/// Message queue that hands out pre-loaded batches, one per `receive`.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_batch(&self, batch: Vec<QueueMessage>) {
        self.state.lock().await.batches.push_back(batch);
    }

    pub async fn receive_calls(&self) -> Vec<Option<u32>> {
        self.state.lock().await.receive_calls.clone()
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn receive(&self, max: Option<u32>) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        state.receive_calls.push(max);
        Ok(state.batches.pop_front().unwrap_or_default())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.deleted.iter().any(|r| r == receipt_handle) {
            state.deleted.push(receipt_handle.to_string());
        }
        Ok(())
    }
}

/// Object source backed by a map. Objects are streamed in `chunk_size`
/// pieces so copy loops see more than one frame.
#[derive(Clone)]
pub struct MemoryObjectSource {
    objects: Arc<Mutex<BTreeMap<(String, String), Bytes>>>,
    gets: Arc<AtomicUsize>,
    chunk_size: usize,
}

impl Default for MemoryObjectSource {
    fn default() -> Self {
        Self {
            objects: Arc::default(),
            gets: Arc::default(),
            chunk_size: 4,
        }
    }
}

impl MemoryObjectSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectSource {
    async fn get(&self, bucket: &str, key: &str) -> Result<BytesStream> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let data = self
            .objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::upstream(format!("get s3://{bucket}/{key}"), 404, "NoSuchKey"))?;

        let chunks: Vec<Result<Bytes>> = data
            .chunks(self.chunk_size.max(1))
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn writer_is_invisible_until_closed() {
        let sink = MemorySink::new();
        let mut w = sink.new_writer("b", "k").await.unwrap();
        w.write(b"hello").await.unwrap();
        assert!(sink.objects().await.is_empty());
        w.close().await.unwrap();
        assert_eq!(
            sink.objects().await.get(&("b".into(), "k".into())).unwrap(),
            &Bytes::from_static(b"hello")
        );
    }

    #[tokio::test]
    async fn queue_delete_is_idempotent() {
        let q = MemoryQueue::new();
        q.delete("r1").await.unwrap();
        q.delete("r1").await.unwrap();
        assert_eq!(q.deleted().await, vec!["r1".to_string()]);
        assert!(q.receive(Some(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn object_source_streams_in_chunks() {
        let src = MemoryObjectSource::new();
        src.put("b", "k", &b"0123456789"[..]).await;
        let mut stream = src.get("b", "k").await.unwrap();
        let mut frames = 0;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            frames += 1;
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(frames, 3);
        assert_eq!(out, b"0123456789");
        assert!(src.get("b", "missing").await.is_err());
    }
}
