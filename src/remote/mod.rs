//! Remote document store contract.
//!
//! The engine talks to its backend only through [`RemoteStore`]: live
//! collection and document subscriptions, point reads, and atomic write
//! batches. Everything above this module is backend-agnostic; the
//! in-process [`MemoryStore`] implements the same contract for tests and the
//! sandbox binary.

pub mod error;
pub mod memory;
pub mod paths;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{PantryError, Result};
use crate::types::Collection;

pub use error::{StoreError, StoreErrorKind};
pub use memory::{MemoryStore, StoreDump};

/// Slash-separated path of a collection, e.g. `groups/g1/items`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the document `id` inside this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// The group sub-collection this path names, if any.
    pub fn collection(&self) -> Result<Collection> {
        let last = self.0.rsplit('/').next().unwrap_or_default();
        last.parse()
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document: its collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocPath {
    /// Parse `collection/.../id`. The id is the final segment.
    pub fn parse(path: &str) -> Result<Self> {
        match path.rsplit_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() => Ok(DocPath {
                collection: CollectionPath::new(collection),
                id: id.to_string(),
            }),
            _ => Err(PantryError::Other(format!(
                "invalid document path '{path}': expected collection/id"
            ))),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as delivered by the store: id plus untyped fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserialize the fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

/// Field values for a write, plus the fields the store stamps with its own
/// logical timestamp at commit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    values: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Ask the store to fill `key` with its commit timestamp.
    pub fn server_timestamp(mut self, key: impl Into<String>) -> Self {
        self.server_timestamps.push(key.into());
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn server_timestamps(&self) -> &[String] {
        &self.server_timestamps
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.server_timestamps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Ordering applied to a collection subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create the document, replacing any existing one.
    Insert { path: DocPath, fields: Fields },
    /// Merge fields into an existing document. Fails the batch if it is missing.
    Update { path: DocPath, fields: Fields },
    /// Remove the document. Deleting a missing document is not an error.
    Delete { path: DocPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Insert { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => {
                path
            }
        }
    }
}

/// Idempotent cancellation handle shared between a [`Subscription`] and
/// whoever owns its lifetime.
#[derive(Clone)]
pub struct Unsubscribe {
    inner: Arc<UnsubscribeInner>,
}

struct UnsubscribeInner {
    cancelled: AtomicBool,
    on_cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unsubscribe {
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(UnsubscribeInner {
                cancelled: AtomicBool::new(false),
                on_cancel: Mutex::new(Some(Box::new(on_cancel))),
            }),
        }
    }

    /// Cancel the subscription. Calling this more than once is a no-op.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(f) = self.inner.on_cancel.lock().take() {
            f();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A live stream of full snapshots. Dropping it unsubscribes.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    handle: Unsubscribe,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, handle: Unsubscribe) -> Self {
        Self { rx, handle }
    }

    /// Next snapshot, or `None` once the subscription has been cancelled
    /// or the store has gone away. Snapshots still buffered at cancellation
    /// time are discarded.
    pub async fn recv(&mut self) -> Option<T> {
        if self.handle.is_cancelled() {
            return None;
        }
        let next = self.rx.recv().await;
        if self.handle.is_cancelled() { None } else { next }
    }

    /// A clonable handle that can cancel this subscription from elsewhere.
    pub fn handle(&self) -> Unsubscribe {
        self.handle.clone()
    }

    pub fn unsubscribe(&mut self) {
        self.handle.cancel();
        self.rx.close();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Common interface for remote document stores
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Subscribe to every document in `path`, ordered by `order`. The current
    /// snapshot is delivered first, then a fresh one after every change.
    fn subscribe_collection(
        &self,
        path: &CollectionPath,
        order: &OrderBy,
    ) -> Result<Subscription<Vec<Document>>>;

    /// Subscribe to a single document. `None` means it does not exist.
    fn subscribe_document(&self, path: &DocPath) -> Result<Subscription<Option<Document>>>;

    /// Read a document once.
    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>>;

    /// Commit all writes atomically: either every op applies or none does.
    async fn run_batch(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Insert a document under a fresh id and return that id.
    async fn insert_document(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
        let id = self.new_document_id();
        self.run_batch(vec![WriteOp::Insert {
            path: collection.doc(id.clone()),
            fields,
        }])
        .await?;
        Ok(id)
    }

    /// Merge fields into one existing document.
    async fn update_document(&self, path: &DocPath, fields: Fields) -> Result<()> {
        self.run_batch(vec![WriteOp::Update {
            path: path.clone(),
            fields,
        }])
        .await
    }

    /// Allocate an id for a document that will be written in a batch.
    fn new_document_id(&self) -> String {
        crate::utils::generate_document_id()
    }
}

/// Await a store request, converting an elapsed `timeout` into
/// [`PantryError::StoreTimeout`].
pub async fn with_timeout<T>(timeout: Duration, request: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(PantryError::StoreTimeout(timeout.as_secs())),
    }
}
