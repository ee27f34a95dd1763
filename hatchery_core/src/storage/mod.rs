//! Contracts for the storage-side collaborators: the object sink every
//! connector writes into, plus the message queue and object source used by
//! queue-drain connectors.

pub mod memory;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

/// Stream of object bytes read from an `ObjectSource`.
pub type BytesStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

/// Destination for harvested objects (GCS or any `object_store` backend).
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Open a buffered writer for `bucket`/`key`. Nothing is visible until
    /// the writer is closed.
    async fn new_writer(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectWriter>>;
}

#[async_trait]
pub trait ObjectWriter: Send {
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Commit the object. A commit failure is surfaced here and is fatal for
    /// the caller; partially written objects are not cleaned up.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// One received notification. `receipt_handle` acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Up to `max` messages; an empty batch means the queue is drained for
    /// this poll.
    async fn receive(&self, max: Option<u32>) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a message. Deleting twice is not an error.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<BytesStream>;
}

/// A file referenced by a queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub bucket: String,
    pub path: String,
}
