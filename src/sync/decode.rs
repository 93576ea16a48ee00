//! Typed decoding at the store boundary.
//!
//! Raw [`Document`]s become tagged records here. Anything that does not fit
//! its record type is skipped with a warning instead of reaching the view.

use std::collections::HashSet;

use serde::de::DeserializeOwned;

use crate::remote::{CollectionPath, Document};
use crate::types::{Category, Group, Item, QuickAddShortcut, Timestamp, UserProfile};

/// A record kept in a synchronized sub-collection.
pub trait Record: DeserializeOwned {
    fn set_id(&mut self, id: String);
    fn name(&self) -> &str;
    fn created_at(&self) -> Option<Timestamp>;
}

macro_rules! impl_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Record for $ty {
                fn set_id(&mut self, id: String) {
                    self.id = id;
                }

                fn name(&self) -> &str {
                    &self.name
                }

                fn created_at(&self) -> Option<Timestamp> {
                    self.created_at
                }
            }
        )+
    };
}

impl_record!(Item, Category, QuickAddShortcut);

/// Decode a full collection snapshot.
///
/// Records that fail to deserialize or carry a blank name are dropped. A
/// repeated id keeps its first occurrence. The result is stable-sorted by
/// `createdAt`, with records still waiting for a server timestamp last.
pub fn decode_collection<R: Record>(path: &CollectionPath, docs: Vec<Document>) -> Vec<R> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(docs.len());

    for doc in docs {
        if !seen.insert(doc.id.clone()) {
            tracing::warn!("skipping duplicate document {path}/{}", doc.id);
            continue;
        }
        let mut record: R = match doc.decode() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping malformed document {path}/{}: {e}", doc.id);
                continue;
            }
        };
        if record.name().trim().is_empty() {
            tracing::warn!("skipping document {path}/{} with empty name", doc.id);
            continue;
        }
        record.set_id(doc.id);
        records.push(record);
    }

    records.sort_by_key(|r| (r.created_at().is_none(), r.created_at()));
    records
}

/// Decode the group document. `None` if it is malformed.
pub fn decode_group(doc: &Document) -> Option<Group> {
    decode_single(doc, "groups").map(|mut group: Group| {
        group.id = doc.id.clone();
        group
    })
}

pub fn decode_user(doc: &Document) -> Option<UserProfile> {
    decode_single(doc, "users")
}

fn decode_single<T: DeserializeOwned>(doc: &Document, collection: &str) -> Option<T> {
    match doc.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("malformed document {collection}/{}: {e}", doc.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    fn doc(id: &str, value: Value) -> Document {
        let Value::Object(fields) = value else {
            panic!("fixture must be an object");
        };
        Document::new(id, fields)
    }

    fn item(id: &str, name: &str, created_at: Option<u64>) -> Document {
        let mut value = json!({
            "name": name,
            "checked": false,
            "addedByUid": "u1",
            "category": "Dairy",
        });
        if let Some(ts) = created_at {
            value["createdAt"] = json!(ts);
        }
        doc(id, value)
    }

    fn path() -> CollectionPath {
        CollectionPath::new("groups/g1/items")
    }

    #[test]
    fn test_skips_malformed_and_blank_records() {
        let docs = vec![
            item("a", "Milk", Some(1)),
            doc("b", json!({"name": "Eggs"})),
            item("c", "   ", Some(2)),
            Document::new("d", Map::new()),
            item("e", "Bread", Some(3)),
        ];
        let items: Vec<Item> = decode_collection(&path(), docs);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Bread"]);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[1].id, "e");
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let docs = vec![
            item("a", "Milk", Some(1)),
            item("a", "Milk again", Some(2)),
            item("b", "Bread", Some(3)),
        ];
        let items: Vec<Item> = decode_collection(&path(), docs);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Milk");
    }

    #[test]
    fn test_orders_by_created_at_with_pending_last() {
        let docs = vec![
            item("pending", "Pending", None),
            item("late", "Late", Some(9)),
            item("early", "Early", Some(2)),
            item("tie", "Tie", Some(9)),
        ];
        let items: Vec<Item> = decode_collection(&path(), docs);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "tie", "pending"]);
    }

    #[test]
    fn test_decode_group_sets_id() {
        let group = decode_group(&doc(
            "g1",
            json!({"name": "Home", "createdBy": "u1", "members": ["u1", "u2"]}),
        ))
        .unwrap();
        assert_eq!(group.id, "g1");
        assert_eq!(group.members, vec!["u1", "u2"]);

        assert!(decode_group(&doc("g2", json!({"members": "u1"}))).is_none());
    }

    #[test]
    fn test_decode_user_tolerates_missing_fields() {
        let profile = decode_user(&doc("u1", json!({"email": "a@example.com"}))).unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@example.com"));
        assert_eq!(profile.group_id, None);
    }
}
