//! Collection synchronizer.
//!
//! While a group is bound, one feed per sub-collection (items, categories,
//! quick-add shortcuts) keeps a live subscription ordered by `createdAt`.
//! Every delivery is decoded into a full replacement snapshot and handed to
//! a [`SnapshotSink`] together with the [`SubscriptionTag`] the feed was
//! opened with. The sink compares that tag with the current binding and
//! refuses anything from an older epoch or another group, so a delivery
//! racing a rebind can never reach the new group's state.

pub mod decode;
pub mod feed;

use std::sync::Arc;

use crate::error::Result;
use crate::remote::{CollectionPath, Document, OrderBy, RemoteStore, paths};
use crate::types::{Category, Collection, GroupId, Item, QuickAddShortcut};

pub use decode::{Record, decode_collection, decode_group, decode_user};
pub use feed::{Feed, FlushHandle, flush_all};

/// Field every sub-collection is ordered by.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Identifies the binding a snapshot was produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTag {
    pub epoch: u64,
    pub group_id: GroupId,
    pub collection: Collection,
}

/// A decoded full snapshot of one sub-collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSnapshot {
    Items(Vec<Item>),
    Categories(Vec<Category>),
    Shortcuts(Vec<QuickAddShortcut>),
}

impl CollectionSnapshot {
    fn decode(collection: Collection, path: &CollectionPath, docs: Vec<Document>) -> Self {
        match collection {
            Collection::Items => Self::Items(decode_collection(path, docs)),
            Collection::Categories => Self::Categories(decode_collection(path, docs)),
            Collection::Shortcuts => Self::Shortcuts(decode_collection(path, docs)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Items(v) => v.len(),
            Self::Categories(v) => v.len(),
            Self::Shortcuts(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiver of decoded snapshots.
pub trait SnapshotSink: Send + Sync {
    /// Replace the stored snapshot for `tag.collection`. Returns `false` and
    /// changes nothing if `tag` does not match the current binding.
    fn apply(&self, tag: &SubscriptionTag, snapshot: CollectionSnapshot) -> bool;
}

struct Binding {
    group_id: GroupId,
    epoch: u64,
    feeds: Vec<Feed>,
}

/// Owns the per-group sub-collection feeds.
pub struct CollectionSynchronizer {
    store: Arc<dyn RemoteStore>,
    sink: Arc<dyn SnapshotSink>,
    binding: Option<Binding>,
}

impl CollectionSynchronizer {
    pub fn new(store: Arc<dyn RemoteStore>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            store,
            sink,
            binding: None,
        }
    }

    /// Open the three feeds for `group_id`, tagged with `epoch`.
    ///
    /// Returns `Ok(false)` without touching anything if already bound to
    /// `group_id`. Binding to another group tears the old feeds down first.
    pub fn bind(&mut self, group_id: &str, epoch: u64) -> Result<bool> {
        if self.group_id() == Some(group_id) {
            return Ok(false);
        }
        self.unbind();

        let mut feeds = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let path = paths::sub_collection(group_id, collection);
            // On error the feeds opened so far are dropped, which unsubscribes them.
            let subscription = self
                .store
                .subscribe_collection(&path, &OrderBy::asc(CREATED_AT_FIELD))?;
            let tag = SubscriptionTag {
                epoch,
                group_id: group_id.to_string(),
                collection,
            };
            let sink = Arc::clone(&self.sink);
            let label = format!("{path}#{epoch}");
            feeds.push(Feed::spawn(label, subscription, move |docs: Vec<Document>| {
                let snapshot = CollectionSnapshot::decode(collection, &path, docs);
                if !sink.apply(&tag, snapshot) {
                    tracing::trace!(
                        "discarded stale {} snapshot for group {} (epoch {})",
                        tag.collection,
                        tag.group_id,
                        tag.epoch
                    );
                }
                std::future::ready(())
            }));
        }

        tracing::debug!("synchronizer bound to group {group_id} (epoch {epoch})");
        self.binding = Some(Binding {
            group_id: group_id.to_string(),
            epoch,
            feeds,
        });
        Ok(true)
    }

    /// Cancel every feed. Safe to call when nothing is bound.
    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            for feed in &binding.feeds {
                feed.cancel();
            }
            tracing::debug!(
                "synchronizer unbound from group {} (epoch {})",
                binding.group_id,
                binding.epoch
            );
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.group_id.as_str())
    }

    pub fn epoch(&self) -> Option<u64> {
        self.binding.as_ref().map(|b| b.epoch)
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn flush_handles(&self) -> Vec<FlushHandle> {
        self.binding
            .iter()
            .flat_map(|b| b.feeds.iter().map(Feed::flush_handle))
            .collect()
    }

    /// Wait until every feed has applied the snapshots delivered so far.
    pub async fn flush(&self) {
        flush_all(self.flush_handles()).await;
    }
}

impl Drop for CollectionSynchronizer {
    fn drop(&mut self) {
        self.unbind();
    }
}
