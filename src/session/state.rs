//! Session state machine and the live state it owns.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::coordinator::{ListContext, PendingConfirmation};
use crate::sync::{CollectionSnapshot, SnapshotSink, SubscriptionTag};
use crate::types::{Category, Group, GroupId, Item, MemberProfile, QuickAddShortcut, Uid};
use crate::view::{DerivedView, DuplicateHit, ViewFilter};

/// Why a signed-in user has no list to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoGroupReason {
    /// No `users/{uid}` document
    UserNotFound,
    /// The profile exists but names no group
    MissingGroupId,
    /// The profile's group document does not exist
    GroupNotFound,
    /// The bound group's document disappeared
    GroupRemoved,
}

enum_display!(
    NoGroupReason,
    {
        UserNotFound => "user profile not found",
        MissingGroupId => "user has no group",
        GroupNotFound => "group not found",
        GroupRemoved => "group was removed",
    }
);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    ResolvingGroup {
        uid: Uid,
    },
    Bound {
        uid: Uid,
        group_id: GroupId,
    },
    /// Terminal display state until the identity changes.
    NoGroup {
        uid: Uid,
        reason: NoGroupReason,
    },
}

impl SessionState {
    pub fn uid(&self) -> Option<&str> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::ResolvingGroup { uid }
            | SessionState::Bound { uid, .. }
            | SessionState::NoGroup { uid, .. } => Some(uid),
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            SessionState::Bound { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, SessionState::Bound { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::ResolvingGroup { .. } => "resolving_group",
            SessionState::Bound { .. } => "bound",
            SessionState::NoGroup { .. } => "no_group",
        }
    }
}

/// Change notifications published to observers of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    ItemsChanged,
    CategoriesChanged,
    MembersChanged,
    ShortcutsChanged,
    GroupChanged,
}

/// Read-only view of everything a presentation layer needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBundle {
    pub session: SessionState,
    pub group: Option<Group>,
    pub items: Vec<Item>,
    pub categories: Vec<Category>,
    pub members: Vec<MemberProfile>,
    pub shortcuts: Vec<QuickAddShortcut>,
    pub view: DerivedView,
    pub filter: ViewFilter,
    /// Category filter choices in display order
    pub filter_options: Vec<String>,
    pub duplicate: Option<DuplicateHit>,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub suggested_category: Option<String>,
}

/// Snapshot data owned by the session for the currently bound group.
#[derive(Debug, Default)]
pub(crate) struct Live {
    pub state: SessionState,
    pub epoch: u64,
    pub group: Option<Group>,
    pub items: Vec<Item>,
    /// Bumped on every items snapshot; keys the view cache.
    pub items_revision: u64,
    pub categories: Vec<Category>,
    pub members: Vec<MemberProfile>,
    /// The uid list `members` was resolved from.
    pub members_for: Option<Vec<Uid>>,
    pub shortcuts: Vec<QuickAddShortcut>,
}

impl Live {
    /// Whether a delivery opened for `(epoch, group_id)` still belongs here.
    pub fn accepts(&self, epoch: u64, group_id: &str) -> bool {
        self.epoch == epoch && self.state.group_id() == Some(group_id)
    }

    pub fn list_context(&self) -> Option<ListContext> {
        match &self.state {
            SessionState::Bound { uid, group_id } => Some(ListContext {
                group_id: group_id.clone(),
                actor: uid.clone(),
                items: self.items.clone(),
                categories: self.categories.clone(),
                shortcuts: self.shortcuts.clone(),
            }),
            _ => None,
        }
    }
}

/// Live data plus the event channel. Implements [`SnapshotSink`] for the
/// synchronizer, applying only deliveries tagged with the current binding.
pub(crate) struct LiveState {
    live: RwLock<Live>,
    events: broadcast::Sender<SessionEvent>,
}

const EVENT_CAPACITY: usize = 256;

impl LiveState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            live: RwLock::new(Live::default()),
            events,
        }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Live> {
        self.live.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Live> {
        self.live.write()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Enter `state` under `epoch`, dropping all group data.
    pub fn reset(&self, state: SessionState, epoch: u64) {
        {
            let mut live = self.live.write();
            let from = live.state.name();
            *live = Live {
                state: state.clone(),
                epoch,
                ..Live::default()
            };
            tracing::info!("session: {from} -> {}", state.name());
        }
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Move to `state` if `epoch` is still current. Group data is kept only
    /// when entering `Bound`.
    pub fn transition(&self, epoch: u64, state: SessionState) -> bool {
        {
            let mut live = self.live.write();
            if live.epoch != epoch {
                return false;
            }
            let from = live.state.name();
            if state.is_bound() {
                live.state = state.clone();
            } else {
                *live = Live {
                    state: state.clone(),
                    epoch,
                    ..Live::default()
                };
            }
            tracing::info!("session: {from} -> {}", state.name());
        }
        self.emit(SessionEvent::StateChanged(state));
        true
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.live.read().epoch == epoch
    }
}

impl SnapshotSink for LiveState {
    fn apply(&self, tag: &SubscriptionTag, snapshot: CollectionSnapshot) -> bool {
        let event = {
            let mut live = self.live.write();
            if !live.accepts(tag.epoch, &tag.group_id) {
                return false;
            }
            match snapshot {
                CollectionSnapshot::Items(items) => {
                    live.items = items;
                    live.items_revision += 1;
                    SessionEvent::ItemsChanged
                }
                CollectionSnapshot::Categories(categories) => {
                    live.categories = categories;
                    SessionEvent::CategoriesChanged
                }
                CollectionSnapshot::Shortcuts(shortcuts) => {
                    live.shortcuts = shortcuts;
                    SessionEvent::ShortcutsChanged
                }
            }
        };
        self.emit(event);
        true
    }
}
