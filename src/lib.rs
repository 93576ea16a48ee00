#[macro_use]
mod macros;

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod identity;
pub mod members;
pub mod onboarding;
pub mod remote;
pub mod session;
pub mod sync;
pub mod types;
pub mod utils;
pub mod view;

pub use config::Config;
pub use coordinator::{ActionOutcome, ConfirmAction, Coordinator, ListContext, PendingConfirmation};
pub use error::{ErrorKind, PantryError, Result};
pub use identity::{Identity, IdentityProvider, LocalIdentity};
pub use onboarding::{GroupChoice, RegisterRequest, register};
pub use remote::{MemoryStore, RemoteStore, StoreError, StoreErrorKind};
pub use session::{NoGroupReason, Session, SessionEvent, SessionState, StateBundle, TapOutcome};
pub use types::{
    ALL_CATEGORIES, Category, Collection, Group, GroupId, Item, MemberProfile, QuickAddShortcut, SENTINEL_CATEGORY,
    Timestamp, Uid, UserProfile,
};
pub use view::{CategoryFilter, DerivedView, DuplicateHit, ViewFilter};
