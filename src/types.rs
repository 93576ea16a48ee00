use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PantryError;

/// Category name items fall back to when their category is deleted.
pub const SENTINEL_CATEGORY: &str = "Other";

/// Filter value that shows items from every category.
pub const ALL_CATEGORIES: &str = "All";

pub const GROUPS_COLLECTION: &str = "groups";
pub const USERS_COLLECTION: &str = "users";

/// Authenticated user id as issued by the identity provider.
pub type Uid = String;

/// Document id of a group under `groups/`.
pub type GroupId = String;

/// Server-assigned logical timestamp. Larger values were written later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The per-group sub-collections kept live while a group is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Items,
    Categories,
    Shortcuts,
}

enum_display_fromstr!(
    Collection,
    PantryError::InvalidCollection,
    {
        Items => "items",
        Categories => "categories",
        Shortcuts => "quickBadges",
    }
);

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Items,
        Collection::Categories,
        Collection::Shortcuts,
    ];
}

/// The shared collaboration unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip_deserializing)]
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub created_by: Option<Uid>,
    /// Member uids in join order. Never shrinks through this crate.
    #[serde(default)]
    pub members: Vec<Uid>,
}

/// One entry on the shared list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(skip_deserializing)]
    pub id: String,
    pub name: String,
    pub checked: bool,
    pub added_by_uid: Uid,
    /// Category *name*, not id. `None` only for records written before
    /// categories existed; those read as the sentinel.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Item {
    /// The category this item files under, with missing values reading as the sentinel.
    pub fn category_or<'a>(&'a self, sentinel: &'a str) -> &'a str {
        self.category.as_deref().unwrap_or(sentinel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(skip_deserializing)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// A label that pre-fills an item add when tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAddShortcut {
    #[serde(skip_deserializing)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// The `users/{uid}` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_color: Option<String>,
}

/// Read-only display projection of a group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub uid: Uid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_color: String,
}

impl MemberProfile {
    /// Display name precedence: explicit name, then email, then the raw uid.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref().filter(|e| !e.trim().is_empty()))
            .unwrap_or(&self.uid)
    }
}
