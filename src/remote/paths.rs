//! Persisted layout: `groups/{groupId}` with sub-collections `items`,
//! `categories` and `quickBadges`, plus `users/{uid}` profiles.

use super::{CollectionPath, DocPath};
use crate::types::{Collection, GROUPS_COLLECTION, USERS_COLLECTION};

pub fn groups() -> CollectionPath {
    CollectionPath::new(GROUPS_COLLECTION)
}

pub fn users() -> CollectionPath {
    CollectionPath::new(USERS_COLLECTION)
}

pub fn group(group_id: &str) -> DocPath {
    groups().doc(group_id)
}

pub fn user(uid: &str) -> DocPath {
    users().doc(uid)
}

/// The sub-collection `collection` of group `group_id`.
pub fn sub_collection(group_id: &str, collection: Collection) -> CollectionPath {
    CollectionPath::new(format!("{GROUPS_COLLECTION}/{group_id}/{collection}"))
}

pub fn items(group_id: &str) -> CollectionPath {
    sub_collection(group_id, Collection::Items)
}

pub fn categories(group_id: &str) -> CollectionPath {
    sub_collection(group_id, Collection::Categories)
}

pub fn shortcuts(group_id: &str) -> CollectionPath {
    sub_collection(group_id, Collection::Shortcuts)
}
