//! Session lifecycle manager.
//!
//! A [`Session`] binds the engine to the signed-in user's group:
//!
//! ```text
//! Unauthenticated -> ResolvingGroup -> Bound
//!                          |
//!                          +-> NoGroup (user/group document missing)
//! any state -> Unauthenticated (logout) / ResolvingGroup (identity change)
//! ```
//!
//! Every binding gets a fresh epoch. Feeds are tagged with the epoch they
//! were opened under and the live state refuses deliveries from any other,
//! so teardown followed by a rebind can never leak the old group's data into
//! the new one, however the two race.
//!
//! The session owns the snapshots. Operations validate against them, write
//! through the [`Coordinator`], and wait for the synchronizer to deliver the
//! result; nothing is patched locally.

pub mod state;

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use unicase::UniCase;

use crate::config::Config;
use crate::coordinator::{ActionOutcome, Coordinator, ListContext, PendingConfirmation};
use crate::error::{PantryError, Result};
use crate::identity::{Identity, IdentityProvider};
use crate::members::resolve_members;
use crate::remote::{Document, RemoteStore, paths, with_timeout};
use crate::sync::{CollectionSynchronizer, Feed, FlushHandle, decode_group, decode_user, flush_all};
use crate::types::{GroupId, Uid};
use crate::utils::names_match;
use crate::view::{CategoryFilter, DuplicateHit, ViewCache, ViewFilter, filter_options, suggest_category};

pub use state::{NoGroupReason, SessionEvent, SessionState, StateBundle};

use state::LiveState;

/// Result of tapping a quick-add shortcut.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapOutcome {
    /// An item was added; carries its id.
    Added(String),
    /// This shortcut was already tapped during the session.
    AlreadyAdded,
}

/// Presentation-side state that is not synchronized.
#[derive(Default)]
struct UiState {
    filter: ViewFilter,
    duplicate: Option<DuplicateHit>,
    pending: Option<PendingConfirmation>,
    composer_category: Option<String>,
    tapped: HashSet<UniCase<String>>,
    view_cache: ViewCache,
}

struct Bindings {
    epoch: u64,
    sync: CollectionSynchronizer,
    group_feed: Option<Feed>,
}

impl Bindings {
    fn teardown(&mut self) {
        self.sync.unbind();
        if let Some(feed) = self.group_feed.take() {
            feed.cancel();
        }
    }

    fn flush_handles(&self) -> Vec<FlushHandle> {
        let mut handles = self.sync.flush_handles();
        handles.extend(self.group_feed.as_ref().map(Feed::flush_handle));
        handles
    }
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    config: Arc<Config>,
    coordinator: Coordinator,
    live: Arc<LiveState>,
    // Lock order: bindings, then live, then ui.
    bindings: Mutex<Bindings>,
    ui: Mutex<UiState>,
    identity_task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one user session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(store: Arc<dyn RemoteStore>, config: Config) -> Self {
        let config = Arc::new(config);
        let live = Arc::new(LiveState::new());
        let sync = CollectionSynchronizer::new(Arc::clone(&store), live.clone());
        Self {
            inner: Arc::new(Inner {
                coordinator: Coordinator::new(Arc::clone(&store), Arc::clone(&config)),
                store,
                config,
                live,
                bindings: Mutex::new(Bindings {
                    epoch: 0,
                    sync,
                    group_feed: None,
                }),
                ui: Mutex::new(UiState::default()),
                identity_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn session_state(&self) -> SessionState {
        self.inner.live.read().state.clone()
    }

    /// Observe state and snapshot changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.live.subscribe()
    }

    /// Wait until every feed has applied what the store already delivered,
    /// including member resolution triggered by a group change.
    pub async fn flush(&self) {
        let handles = self.inner.bindings.lock().flush_handles();
        flush_all(handles).await;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Follow `provider`, handling every identity it reports. Replaces any
    /// previously watched provider.
    pub fn watch_identity(&self, provider: &dyn IdentityProvider) {
        let mut rx = provider.observe_identity();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            loop {
                let identity = rx.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = (Session { inner }).handle_identity(identity).await {
                    tracing::warn!("identity change not applied: {e}");
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.inner.identity_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Sign out: tear everything down and return to `Unauthenticated`.
    pub async fn logout(&self) -> Result<()> {
        self.handle_identity(None).await
    }

    /// Apply an identity change.
    ///
    /// `None` tears down and returns to `Unauthenticated`. A new user tears
    /// down and resolves that user's group. The same user while bound is a
    /// no-op.
    ///
    /// Transient store failures while resolving leave the session in
    /// `ResolvingGroup` and are returned. Confirmed absence of the profile,
    /// its group id, or the group enters `NoGroup` and returns the matching
    /// not-found error.
    pub async fn handle_identity(&self, identity: Option<Identity>) -> Result<()> {
        let Some(identity) = identity else {
            self.begin(SessionState::Unauthenticated);
            return Ok(());
        };

        {
            let live = self.inner.live.read();
            if let SessionState::Bound { uid, .. } = &live.state
                && *uid == identity.uid
            {
                return Ok(());
            }
        }

        let uid = identity.uid;
        let epoch = self.begin(SessionState::ResolvingGroup { uid: uid.clone() });
        self.resolve(epoch, uid).await
    }

    /// Tear down, bump the epoch, and enter `state`. Returns the new epoch.
    fn begin(&self, state: SessionState) -> u64 {
        let mut bindings = self.inner.bindings.lock();
        bindings.teardown();
        bindings.epoch += 1;
        let epoch = bindings.epoch;
        self.inner.live.reset(state, epoch);
        self.inner.reset_ui();
        epoch
    }

    async fn resolve(&self, epoch: u64, uid: Uid) -> Result<()> {
        let inner = &self.inner;
        let timeout = inner.config.store_timeout();

        let user_doc = with_timeout(timeout, inner.store.get_document(&paths::user(&uid))).await?;
        if !inner.live.is_current(epoch) {
            return Ok(());
        }
        let Some(profile) = user_doc.as_ref().and_then(decode_user) else {
            return self.no_group(epoch, uid.clone(), NoGroupReason::UserNotFound, PantryError::UserNotFound(uid));
        };
        let Some(group_id) = profile.group_id.filter(|g| !g.trim().is_empty()) else {
            return self.no_group(epoch, uid.clone(), NoGroupReason::MissingGroupId, PantryError::MissingGroupId(uid));
        };

        let group_doc = with_timeout(timeout, inner.store.get_document(&paths::group(&group_id))).await?;
        if !inner.live.is_current(epoch) {
            return Ok(());
        }
        if group_doc.as_ref().and_then(decode_group).is_none() {
            return self.no_group(
                epoch,
                uid,
                NoGroupReason::GroupNotFound,
                PantryError::GroupNotFound(group_id),
            );
        }

        self.bind(epoch, uid, group_id)
    }

    fn no_group(&self, epoch: u64, uid: Uid, reason: NoGroupReason, err: PantryError) -> Result<()> {
        if self
            .inner
            .live
            .transition(epoch, SessionState::NoGroup { uid, reason })
        {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn bind(&self, epoch: u64, uid: Uid, group_id: GroupId) -> Result<()> {
        let inner = &self.inner;
        let mut bindings = inner.bindings.lock();
        if bindings.epoch != epoch {
            return Ok(());
        }

        // Enter Bound first so the feeds' initial snapshots are accepted.
        inner.live.transition(
            epoch,
            SessionState::Bound {
                uid: uid.clone(),
                group_id: group_id.clone(),
            },
        );

        let opened = bindings.sync.bind(&group_id, epoch).and_then(|_| {
            let subscription = inner.store.subscribe_document(&paths::group(&group_id))?;
            let weak = Arc::downgrade(&self.inner);
            let feed_group = group_id.clone();
            Ok(Feed::spawn(
                format!("groups/{group_id}#{epoch}"),
                subscription,
                move |doc: Option<Document>| {
                    let weak = weak.clone();
                    let group_id = feed_group.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_group_snapshot(epoch, &group_id, doc).await;
                        }
                    }
                },
            ))
        });

        match opened {
            Ok(feed) => {
                bindings.group_feed = Some(feed);
                Ok(())
            }
            Err(e) => {
                bindings.teardown();
                inner.live.transition(epoch, SessionState::ResolvingGroup { uid });
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Everything a presentation layer renders, as one consistent copy.
    pub fn state(&self) -> StateBundle {
        let inner = &self.inner;
        let live = inner.live.read();
        let mut guard = inner.ui.lock();
        let ui = &mut *guard;
        let sentinel = &inner.config.sentinel_category;

        let view = ui
            .view_cache
            .get(live.items_revision, &live.items, &ui.filter, sentinel)
            .clone();
        let suggested_category = suggest_category(
            &live.categories,
            ui.composer_category.as_deref(),
            sentinel,
        );

        StateBundle {
            session: live.state.clone(),
            group: live.group.clone(),
            items: live.items.clone(),
            categories: live.categories.clone(),
            members: live.members.clone(),
            shortcuts: live.shortcuts.clone(),
            view,
            filter: ui.filter.clone(),
            filter_options: filter_options(&live.categories, &inner.config),
            duplicate: ui.duplicate.clone(),
            pending_confirmation: ui.pending.clone(),
            suggested_category,
        }
    }

    /// Filter by category label; the configured "All" label clears it.
    pub fn set_filter_category(&self, label: &str) {
        let filter = CategoryFilter::from_label(label, &self.inner.config);
        self.inner.ui.lock().filter.category = filter;
    }

    pub fn set_search(&self, text: &str) {
        self.inner.ui.lock().filter.search = text.to_string();
    }

    pub fn set_filter(&self, filter: ViewFilter) {
        self.inner.ui.lock().filter = filter;
    }

    /// Category preselected for new items.
    pub fn set_composer_category(&self, category: Option<&str>) {
        self.inner.ui.lock().composer_category = category.map(str::to_string);
    }

    /// Drop the duplicate-item highlight.
    pub fn dismiss_duplicate(&self) {
        self.inner.ui.lock().duplicate = None;
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    fn context(&self) -> Result<ListContext> {
        self.inner
            .live
            .read()
            .list_context()
            .ok_or(PantryError::NotBound)
    }

    /// Hold a successful write until its snapshot has been applied, so the
    /// next operation checks against state that includes it.
    async fn applied<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.flush().await;
        }
        result
    }

    /// Add an item. Without a category it files under the sentinel.
    ///
    /// On a duplicate the colliding item is remembered for highlighting;
    /// a successful add clears it.
    pub async fn add_item(&self, name: &str, category: Option<&str>) -> Result<String> {
        let ctx = self.context()?;
        let result = self.applied(self.inner.coordinator.add_item(&ctx, name, category).await).await;
        let mut ui = self.inner.ui.lock();
        match &result {
            Ok(_) => ui.duplicate = None,
            Err(PantryError::DuplicateItem {
                existing_id,
                existing_name,
                ..
            }) => {
                ui.duplicate = Some(DuplicateHit {
                    id: existing_id.clone(),
                    name: existing_name.clone(),
                });
            }
            Err(_) => {}
        }
        result
    }

    pub async fn toggle_item(&self, id: &str) -> Result<bool> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.toggle_item(&ctx, id).await).await
    }

    pub async fn toggle_all(&self) -> Result<Option<bool>> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.toggle_all(&ctx).await).await
    }

    pub async fn clear_completed(&self) -> Result<usize> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.clear_completed(&ctx).await).await
    }

    pub async fn add_category(&self, name: &str) -> Result<String> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.add_category(&ctx, name).await).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<usize> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.delete_category(&ctx, id).await).await
    }

    pub async fn add_shortcuts(&self, input: &str) -> Result<Vec<String>> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.add_shortcuts(&ctx, input).await).await
    }

    pub async fn delete_shortcut(&self, name: &str) -> Result<String> {
        let ctx = self.context()?;
        self.applied(self.inner.coordinator.delete_shortcut(&ctx, name).await).await
    }

    /// Add an item named after a shortcut, at most once per session.
    pub async fn tap_shortcut(&self, name: &str) -> Result<TapOutcome> {
        let ctx = self.context()?;
        let shortcut = ctx
            .shortcuts
            .iter()
            .find(|s| names_match(&s.name, name))
            .ok_or_else(|| PantryError::ShortcutNotFound(name.trim().to_string()))?;
        let key = UniCase::new(shortcut.name.clone());
        if self.inner.ui.lock().tapped.contains(&key) {
            return Ok(TapOutcome::AlreadyAdded);
        }

        let category = {
            let ui = self.inner.ui.lock();
            suggest_category(
                &ctx.categories,
                ui.composer_category.as_deref(),
                &self.inner.config.sentinel_category,
            )
        };
        let id = self.add_item(&shortcut.name, category.as_deref()).await?;
        self.inner.ui.lock().tapped.insert(key);
        Ok(TapOutcome::Added(id))
    }

    /// First phase of clearing every shortcut. Returns the confirmation
    /// that is now pending.
    pub fn request_clear_shortcuts(&self) -> Result<PendingConfirmation> {
        let ctx = self.context()?;
        let pending = PendingConfirmation::clear_shortcuts(ctx.shortcuts.len());
        self.inner.ui.lock().pending = Some(pending.clone());
        Ok(pending)
    }

    /// Execute the pending action.
    pub async fn confirm_pending(&self) -> Result<ActionOutcome> {
        let ctx = self.context()?;
        let pending = self
            .inner
            .ui
            .lock()
            .pending
            .take()
            .ok_or(PantryError::NoPendingConfirmation)?;
        let outcome = self
            .applied(self.inner.coordinator.execute(&ctx, &pending.action).await)
            .await?;
        match outcome {
            ActionOutcome::ShortcutsCleared(_) => self.inner.ui.lock().tapped.clear(),
        }
        Ok(outcome)
    }

    /// Drop the pending action. Returns whether one was pending.
    pub fn cancel_pending(&self) -> bool {
        self.inner.ui.lock().pending.take().is_some()
    }
}

impl Inner {
    fn reset_ui(&self) {
        let mut ui = self.ui.lock();
        *ui = UiState::default();
    }

    /// Apply a group document delivery for binding `epoch`.
    async fn on_group_snapshot(&self, epoch: u64, group_id: &str, doc: Option<Document>) {
        let Some(doc) = doc else {
            self.group_removed(epoch, group_id);
            return;
        };
        let Some(group) = decode_group(&doc) else {
            return;
        };

        let members_to_resolve = {
            let mut live = self.live.write();
            if !live.accepts(epoch, group_id) {
                return;
            }
            let changed = live.members_for.as_ref() != Some(&group.members);
            let uids = group.members.clone();
            live.group = Some(group);
            changed.then_some(uids)
        };
        self.live.emit(SessionEvent::GroupChanged);

        let Some(uids) = members_to_resolve else {
            return;
        };
        let members = resolve_members(
            self.store.as_ref(),
            &uids,
            &self.config.avatar,
            self.config.store_timeout(),
        )
        .await;

        {
            let mut live = self.live.write();
            if !live.accepts(epoch, group_id) {
                return;
            }
            live.members = members;
            live.members_for = Some(uids);
        }
        self.live.emit(SessionEvent::MembersChanged);
    }

    fn group_removed(&self, epoch: u64, group_id: &str) {
        let mut bindings = self.bindings.lock();
        let uid = {
            let live = self.live.read();
            if !live.accepts(epoch, group_id) {
                return;
            }
            live.state.uid().map(str::to_string).unwrap_or_default()
        };
        tracing::warn!("group {group_id} disappeared; unbinding");
        self.live.transition(
            epoch,
            SessionState::NoGroup {
                uid,
                reason: NoGroupReason::GroupRemoved,
            },
        );
        self.reset_ui();
        // Last: this cancels the feed currently running this handler.
        bindings.teardown();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.identity_task.lock().take() {
            task.abort();
        }
        self.bindings.lock().teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use serde_json::json;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put_document(
                &paths::group("g1"),
                json!({"name": "Home", "createdBy": "u1", "members": ["u1"]}),
            )
            .unwrap();
        store
            .put_document(
                &paths::user("u1"),
                json!({"email": "ann@example.com", "name": "Ann", "groupId": "g1"}),
            )
            .unwrap();
        store
    }

    fn ann() -> Option<Identity> {
        Some(Identity::new("u1", Some("ann@example.com".to_string())))
    }

    #[tokio::test]
    async fn test_operations_require_binding() {
        let session = Session::new(seeded_store(), Config::default());
        assert!(matches!(
            session.add_item("Milk", None).await,
            Err(PantryError::NotBound)
        ));
        assert!(matches!(
            session.request_clear_shortcuts(),
            Err(PantryError::NotBound)
        ));
    }

    #[tokio::test]
    async fn test_binds_and_resolves_members() {
        let store = seeded_store();
        let session = Session::new(store.clone(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        session.flush().await;

        let state = session.state();
        assert_eq!(
            state.session,
            SessionState::Bound {
                uid: "u1".to_string(),
                group_id: "g1".to_string()
            }
        );
        assert_eq!(state.group.map(|g| g.name), Some("Home".to_string()));
        assert_eq!(state.members.len(), 1);
        assert_eq!(state.members[0].display_name(), "Ann");
        // three sub-collections plus the group document
        assert_eq!(store.subscriber_count(), 4);
    }

    #[tokio::test]
    async fn test_same_identity_while_bound_is_noop() {
        let store = seeded_store();
        let session = Session::new(store.clone(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        session.flush().await;
        let mut events = session.subscribe();

        session.handle_identity(ann()).await.unwrap();
        assert!(events.try_recv().is_err());
        assert_eq!(store.subscriber_count(), 4);
    }

    #[tokio::test]
    async fn test_logout_tears_everything_down() {
        let store = seeded_store();
        let session = Session::new(store.clone(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        session.add_item("Milk", None).await.unwrap();
        session.flush().await;
        assert_eq!(session.state().items.len(), 1);

        session.logout().await.unwrap();
        assert_eq!(session.session_state(), SessionState::Unauthenticated);
        assert_eq!(store.subscriber_count(), 0);
        let state = session.state();
        assert!(state.items.is_empty());
        assert!(state.group.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_pointer_set_and_cleared() {
        let session = Session::new(seeded_store(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        let milk = session.add_item("Milk", None).await.unwrap();
        session.flush().await;

        assert!(session.add_item(" milk ", None).await.is_err());
        assert_eq!(
            session.state().duplicate,
            Some(DuplicateHit {
                id: milk,
                name: "Milk".to_string()
            })
        );

        session.dismiss_duplicate();
        assert_eq!(session.state().duplicate, None);

        assert!(session.add_item("MILK", None).await.is_err());
        assert!(session.state().duplicate.is_some());
        session.add_item("Bread", None).await.unwrap();
        assert_eq!(session.state().duplicate, None);
    }

    #[tokio::test]
    async fn test_tap_shortcut_once() {
        let session = Session::new(seeded_store(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        session.add_shortcuts("Eggs").await.unwrap();
        session.flush().await;

        assert!(matches!(
            session.tap_shortcut("eggs").await.unwrap(),
            TapOutcome::Added(_)
        ));
        session.flush().await;
        assert_eq!(session.tap_shortcut("Eggs").await.unwrap(), TapOutcome::AlreadyAdded);
        assert_eq!(session.state().items.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_shortcuts_needs_confirmation() {
        let session = Session::new(seeded_store(), Config::default());
        session.handle_identity(ann()).await.unwrap();
        session.add_shortcuts("Eggs, Milk").await.unwrap();
        session.flush().await;

        assert!(matches!(
            session.confirm_pending().await,
            Err(PantryError::NoPendingConfirmation)
        ));

        session.request_clear_shortcuts().unwrap();
        assert!(session.state().pending_confirmation.is_some());
        assert!(session.cancel_pending());
        assert!(!session.cancel_pending());
        session.flush().await;
        assert_eq!(session.state().shortcuts.len(), 2);

        session.request_clear_shortcuts().unwrap();
        assert_eq!(
            session.confirm_pending().await.unwrap(),
            ActionOutcome::ShortcutsCleared(2)
        );
        session.flush().await;
        let state = session.state();
        assert!(state.shortcuts.is_empty());
        assert!(state.pending_confirmation.is_none());
    }
}
