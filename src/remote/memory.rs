//! In-process implementation of [`RemoteStore`].
//!
//! Documents live in one `RwLock`-guarded tree keyed by collection path, so a
//! batch is validated and applied under a single write lock and subscribers
//! never observe half of it. Subscribers are tracked in a `DashMap` and fed
//! over unbounded tokio channels: the current snapshot on subscribe, then a
//! full refreshed snapshot after every commit touching their path.
//!
//! Besides backing the test suite, the store can be exported to and imported
//! from JSON ([`StoreDump`]), which is how the sandbox binary persists state
//! between invocations.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{
    CollectionPath, Direction, DocPath, Document, Fields, OrderBy, RemoteStore, StoreError,
    Subscription, Unsubscribe, WriteOp,
};
use crate::error::{PantryError, Result};

type DocumentTree = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDump {
    /// Last logical timestamp handed out
    #[serde(default)]
    pub clock: u64,
    /// Collection path -> document id -> fields
    #[serde(default)]
    pub documents: DocumentTree,
}

enum Subscriber {
    Collection {
        path: CollectionPath,
        order: OrderBy,
        tx: mpsc::UnboundedSender<Vec<Document>>,
    },
    Document {
        path: DocPath,
        tx: mpsc::UnboundedSender<Option<Document>>,
    },
}

#[derive(Default)]
struct StoreState {
    clock: u64,
    documents: DocumentTree,
}

/// In-memory document store with live subscriptions and atomic batches.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    subscribers: Arc<DashMap<u64, Subscriber>>,
    next_subscriber: AtomicU64,
    commits: AtomicU64,
    failing_writes: AtomicUsize,
    failing_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a previously exported image.
    pub fn from_dump(dump: StoreDump) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            state.clock = dump.clock;
            state.documents = dump.documents;
        }
        store
    }

    /// Snapshot the full contents for persistence.
    pub fn export(&self) -> StoreDump {
        let state = self.state.read();
        StoreDump {
            clock: state.clock,
            documents: state.documents.clone(),
        }
    }

    /// Make the next `n` write requests fail with an `Unavailable` error.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` point reads fail with an `Unavailable` error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Number of batches committed so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Write a document directly, bypassing fault injection. The value must
    /// be a JSON object; it replaces any existing document at `path`.
    pub fn put_document(&self, path: &DocPath, value: Value) -> Result<()> {
        let Value::Object(values) = value else {
            return Err(PantryError::MalformedDocument {
                path: path.to_string(),
                reason: "document must be a JSON object".to_string(),
            });
        };
        let mut fields = Fields::new();
        for (key, value) in values {
            fields = fields.set(key, value);
        }
        self.commit(vec![WriteOp::Insert {
            path: path.clone(),
            fields,
        }])
    }

    /// Current documents of a collection, ordered by id.
    pub fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        let state = self.state.read();
        state
            .documents
            .get(path.as_str())
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn document(&self, path: &DocPath) -> Option<Document> {
        let state = self.state.read();
        read_document(&state.documents, path)
    }

    fn take_fault(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Validate and apply `ops` under one write lock, then notify subscribers.
    fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut state = self.state.write();

        // Stage every touched collection so a failing op leaves nothing behind.
        let mut staged: DocumentTree = BTreeMap::new();
        let mut clock = state.clock;
        let mut touched_docs: BTreeSet<DocPath> = BTreeSet::new();

        for op in &ops {
            let path = op.path();
            let key = path.collection.as_str();
            if !staged.contains_key(key) {
                let current = state.documents.get(key).cloned().unwrap_or_default();
                staged.insert(key.to_string(), current);
            }
            let Some(collection) = staged.get_mut(key) else {
                continue;
            };

            match op {
                WriteOp::Insert { fields, .. } => {
                    let mut values = fields.values().clone();
                    stamp(&mut values, fields, &mut clock);
                    collection.insert(path.id.clone(), values);
                }
                WriteOp::Update { fields, .. } => {
                    let Some(existing) = collection.get_mut(&path.id) else {
                        return Err(StoreError::missing_document(path).into());
                    };
                    for (k, v) in fields.values() {
                        existing.insert(k.clone(), v.clone());
                    }
                    stamp(existing, fields, &mut clock);
                }
                WriteOp::Delete { .. } => {
                    collection.remove(&path.id);
                }
            }
            touched_docs.insert(path.clone());
        }

        for (key, docs) in staged {
            if docs.is_empty() {
                state.documents.remove(&key);
            } else {
                state.documents.insert(key, docs);
            }
        }
        state.clock = clock;
        self.commits.fetch_add(1, Ordering::SeqCst);

        let touched_collections: BTreeSet<&CollectionPath> =
            touched_docs.iter().map(|d| &d.collection).collect();
        self.notify(&state.documents, &touched_collections, &touched_docs);
        Ok(())
    }

    fn notify(
        &self,
        documents: &DocumentTree,
        collections: &BTreeSet<&CollectionPath>,
        docs: &BTreeSet<DocPath>,
    ) {
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            let delivered = match entry.value() {
                Subscriber::Collection { path, order, tx } if collections.contains(path) => {
                    tx.send(collection_snapshot(documents, path, order)).is_ok()
                }
                Subscriber::Document { path, tx } if docs.contains(path) => {
                    tx.send(read_document(documents, path)).is_ok()
                }
                _ => true,
            };
            if !delivered {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }

    fn register(&self, subscriber: Subscriber) -> Unsubscribe {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.insert(id, subscriber);
        let registry = Arc::clone(&self.subscribers);
        Unsubscribe::new(move || {
            registry.remove(&id);
        })
    }
}

fn stamp(values: &mut Map<String, Value>, fields: &Fields, clock: &mut u64) {
    for key in fields.server_timestamps() {
        *clock += 1;
        values.insert(key.clone(), Value::from(*clock));
    }
}

fn read_document(documents: &DocumentTree, path: &DocPath) -> Option<Document> {
    documents
        .get(path.collection.as_str())
        .and_then(|docs| docs.get(&path.id))
        .map(|fields| Document::new(path.id.clone(), fields.clone()))
}

fn collection_snapshot(
    documents: &DocumentTree,
    path: &CollectionPath,
    order: &OrderBy,
) -> Vec<Document> {
    let mut snapshot: Vec<Document> = documents
        .get(path.as_str())
        .map(|docs| {
            docs.iter()
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                .collect()
        })
        .unwrap_or_default();

    snapshot.sort_by(|a, b| {
        let ordering = compare_values(a.fields.get(&order.field), b.fields.get(&order.field))
            .then_with(|| a.id.cmp(&b.id));
        match order.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });
    snapshot
}

/// Total order over optional JSON values: missing and null sort first, then
/// booleans, numbers, and strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe_collection(
        &self,
        path: &CollectionPath,
        order: &OrderBy,
    ) -> Result<Subscription<Vec<Document>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Hold the read lock so no commit slips between the initial snapshot
        // and registration.
        let state = self.state.read();
        let _ = tx.send(collection_snapshot(&state.documents, path, order));
        let handle = self.register(Subscriber::Collection {
            path: path.clone(),
            order: order.clone(),
            tx,
        });
        drop(state);
        tracing::debug!("memory store: subscribed to collection {path}");
        Ok(Subscription::new(rx, handle))
    }

    fn subscribe_document(&self, path: &DocPath) -> Result<Subscription<Option<Document>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = self.state.read();
        let _ = tx.send(read_document(&state.documents, path));
        let handle = self.register(Subscriber::Document {
            path: path.clone(),
            tx,
        });
        drop(state);
        tracing::debug!("memory store: subscribed to document {path}");
        Ok(Subscription::new(rx, handle))
    }

    async fn get_document(&self, path: &DocPath) -> Result<Option<Document>> {
        if Self::take_fault(&self.failing_reads) {
            return Err(StoreError::unavailable(format!("injected read failure for {path}")).into());
        }
        Ok(self.document(path))
    }

    async fn run_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        if Self::take_fault(&self.failing_writes) {
            return Err(StoreError::unavailable("injected write failure").into());
        }
        if ops.is_empty() {
            return Ok(());
        }
        self.commit(ops)
    }
}
