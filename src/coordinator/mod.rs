//! Consistency coordinator.
//!
//! Every mutation of a group's list goes through here. Inputs are validated
//! against the caller's current snapshots before the store is touched, and
//! each operation is a single store request: either one write or one atomic
//! batch. Nothing is patched locally; the result shows up through the
//! synchronizer's next snapshot.
//!
//! Item categories are stored by name, so deleting a category rewrites its
//! items to the sentinel in the same batch that deletes it. No snapshot can
//! ever show an item pointing at a category that no longer exists.

pub mod confirm;
pub mod validate;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{PantryError, Result};
use crate::remote::{DocPath, Fields, RemoteStore, WriteOp, paths, with_timeout};
use crate::sync::CREATED_AT_FIELD;
use crate::types::{Category, GroupId, Item, QuickAddShortcut, Uid};
use crate::utils::names_match;

pub use confirm::{ActionOutcome, ConfirmAction, PendingConfirmation};
pub use validate::{
    check_new_category, check_new_item, parse_shortcut_submission, resolve_item_category,
};

/// The group, the acting user, and the snapshots an operation validates against.
#[derive(Debug, Clone, Default)]
pub struct ListContext {
    pub group_id: GroupId,
    pub actor: Uid,
    pub items: Vec<Item>,
    pub categories: Vec<Category>,
    pub shortcuts: Vec<QuickAddShortcut>,
}

/// Issues validated writes against the remote store.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn RemoteStore>,
    config: Arc<Config>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn RemoteStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add an item. Returns the new item's id.
    pub async fn add_item(&self, ctx: &ListContext, name: &str, category: Option<&str>) -> Result<String> {
        let name = check_new_item(name, &ctx.items)?;
        let category = resolve_item_category(category, &ctx.categories, &self.config.sentinel_category)?;

        let id = self.store.new_document_id();
        let fields = Fields::new()
            .set("name", name.as_str())
            .set("checked", false)
            .set("addedByUid", ctx.actor.as_str())
            .set("category", category)
            .server_timestamp(CREATED_AT_FIELD);
        self.commit(
            "add item",
            vec![WriteOp::Insert {
                path: paths::items(&ctx.group_id).doc(id.clone()),
                fields,
            }],
        )
        .await?;
        tracing::debug!("added item '{name}' ({id}) to group {}", ctx.group_id);
        Ok(id)
    }

    /// Flip one item's checked flag. Returns the new value.
    pub async fn toggle_item(&self, ctx: &ListContext, id: &str) -> Result<bool> {
        let item = find_item(ctx, id)?;
        let checked = !item.checked;
        self.commit(
            "toggle item",
            vec![WriteOp::Update {
                path: item_path(ctx, id),
                fields: Fields::new().set("checked", checked),
            }],
        )
        .await?;
        Ok(checked)
    }

    /// Set every item to `!all_checked` in one batch. Returns the target
    /// value, or `None` without writing when the list is empty.
    pub async fn toggle_all(&self, ctx: &ListContext) -> Result<Option<bool>> {
        if ctx.items.is_empty() {
            return Ok(None);
        }
        let target = !ctx.items.iter().all(|i| i.checked);
        let ops = ctx
            .items
            .iter()
            .map(|item| WriteOp::Update {
                path: item_path(ctx, &item.id),
                fields: Fields::new().set("checked", target),
            })
            .collect();
        self.commit("toggle all", ops).await?;
        Ok(Some(target))
    }

    /// Delete every checked item in one batch. Returns how many were removed.
    pub async fn clear_completed(&self, ctx: &ListContext) -> Result<usize> {
        let ops: Vec<WriteOp> = ctx
            .items
            .iter()
            .filter(|i| i.checked)
            .map(|item| WriteOp::Delete {
                path: item_path(ctx, &item.id),
            })
            .collect();
        if ops.is_empty() {
            return Ok(0);
        }
        let removed = ops.len();
        self.commit("clear completed", ops).await?;
        Ok(removed)
    }

    /// Add a category. Returns its id.
    pub async fn add_category(&self, ctx: &ListContext, name: &str) -> Result<String> {
        let name = check_new_category(name, &ctx.categories)?;
        let id = self.store.new_document_id();
        let fields = Fields::new()
            .set("name", name.as_str())
            .server_timestamp(CREATED_AT_FIELD);
        self.commit(
            "add category",
            vec![WriteOp::Insert {
                path: paths::categories(&ctx.group_id).doc(id.clone()),
                fields,
            }],
        )
        .await?;
        Ok(id)
    }

    /// Delete a category and move its items to the sentinel, atomically.
    /// Returns how many items were reassigned.
    pub async fn delete_category(&self, ctx: &ListContext, id: &str) -> Result<usize> {
        let category = ctx
            .categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| PantryError::CategoryNotFound(id.to_string()))?;
        let sentinel = &self.config.sentinel_category;

        let mut ops: Vec<WriteOp> = ctx
            .items
            .iter()
            .filter(|i| i.category.as_deref() == Some(category.name.as_str()))
            .map(|item| WriteOp::Update {
                path: item_path(ctx, &item.id),
                fields: Fields::new().set("category", sentinel.as_str()),
            })
            .collect();
        let reassigned = ops.len();
        ops.push(WriteOp::Delete {
            path: paths::categories(&ctx.group_id).doc(id),
        });

        self.commit("delete category", ops).await?;
        tracing::debug!(
            "deleted category '{}', {reassigned} item(s) moved to '{sentinel}'",
            category.name
        );
        Ok(reassigned)
    }

    /// Add one or more shortcuts from a separator-delimited submission, all
    /// or nothing. Returns the names added, in submission order.
    pub async fn add_shortcuts(&self, ctx: &ListContext, input: &str) -> Result<Vec<String>> {
        let names = parse_shortcut_submission(input, &self.config.shortcut_separator, &ctx.shortcuts)?;
        let collection = paths::shortcuts(&ctx.group_id);
        let ops = names
            .iter()
            .map(|name| WriteOp::Insert {
                path: collection.doc(self.store.new_document_id()),
                fields: Fields::new()
                    .set("name", name.as_str())
                    .server_timestamp(CREATED_AT_FIELD),
            })
            .collect();
        self.commit("add shortcuts", ops).await?;
        Ok(names)
    }

    /// Delete the shortcut called `name`. Returns its id.
    pub async fn delete_shortcut(&self, ctx: &ListContext, name: &str) -> Result<String> {
        let wanted = name.trim();
        let shortcut = ctx
            .shortcuts
            .iter()
            .find(|s| s.name == wanted)
            .or_else(|| ctx.shortcuts.iter().find(|s| names_match(&s.name, wanted)))
            .ok_or_else(|| PantryError::ShortcutNotFound(wanted.to_string()))?;
        self.commit(
            "delete shortcut",
            vec![WriteOp::Delete {
                path: paths::shortcuts(&ctx.group_id).doc(shortcut.id.as_str()),
            }],
        )
        .await?;
        Ok(shortcut.id.clone())
    }

    /// Delete every shortcut in one batch. Returns how many were removed.
    pub async fn clear_shortcuts(&self, ctx: &ListContext) -> Result<usize> {
        if ctx.shortcuts.is_empty() {
            return Ok(0);
        }
        let collection = paths::shortcuts(&ctx.group_id);
        let ops: Vec<WriteOp> = ctx
            .shortcuts
            .iter()
            .map(|s| WriteOp::Delete {
                path: collection.doc(s.id.as_str()),
            })
            .collect();
        let removed = ops.len();
        self.commit("clear shortcuts", ops).await?;
        Ok(removed)
    }

    /// Run a confirmed action.
    pub async fn execute(&self, ctx: &ListContext, action: &ConfirmAction) -> Result<ActionOutcome> {
        match action {
            ConfirmAction::ClearShortcuts => {
                self.clear_shortcuts(ctx).await.map(ActionOutcome::ShortcutsCleared)
            }
        }
    }

    async fn commit(&self, what: &str, ops: Vec<WriteOp>) -> Result<()> {
        let timeout = self.config.store_timeout();
        with_timeout(timeout, self.store.run_batch(ops))
            .await
            .inspect_err(|e| tracing::warn!("{what} failed: {e}"))
    }
}

fn find_item<'a>(ctx: &'a ListContext, id: &str) -> Result<&'a Item> {
    ctx.items
        .iter()
        .find(|i| i.id == id)
        .ok_or_else(|| PantryError::ItemNotFound(id.to_string()))
}

fn item_path(ctx: &ListContext, id: &str) -> DocPath {
    paths::items(&ctx.group_id).doc(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use crate::sync::decode_collection;
    use serde_json::json;

    const GROUP: &str = "g1";

    fn setup() -> (Arc<MemoryStore>, Coordinator) {
        let store = Arc::new(MemoryStore::new());
        let coordinator = Coordinator::new(store.clone(), Arc::new(Config::default()));
        (store, coordinator)
    }

    /// Context read straight from the store, as a fresh snapshot would deliver it.
    fn context(store: &MemoryStore) -> ListContext {
        let items = paths::items(GROUP);
        let categories = paths::categories(GROUP);
        let shortcuts = paths::shortcuts(GROUP);
        ListContext {
            group_id: GROUP.to_string(),
            actor: "u1".to_string(),
            items: decode_collection(&items, store.documents(&items)),
            categories: decode_collection(&categories, store.documents(&categories)),
            shortcuts: decode_collection(&shortcuts, store.documents(&shortcuts)),
        }
    }

    fn seed_item(store: &MemoryStore, id: &str, name: &str, category: &str, checked: bool, ts: u64) {
        store
            .put_document(
                &paths::items(GROUP).doc(id),
                json!({
                    "name": name,
                    "checked": checked,
                    "addedByUid": "u1",
                    "category": category,
                    "createdAt": ts,
                }),
            )
            .unwrap();
    }

    fn seed_category(store: &MemoryStore, id: &str, name: &str, ts: u64) {
        store
            .put_document(
                &paths::categories(GROUP).doc(id),
                json!({"name": name, "createdAt": ts}),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_item_defaults_to_sentinel() {
        let (store, coordinator) = setup();
        let id = coordinator
            .add_item(&context(&store), "  Milk ", None)
            .await
            .unwrap();

        let ctx = context(&store);
        assert_eq!(ctx.items.len(), 1);
        let item = &ctx.items[0];
        assert_eq!(item.id, id);
        assert_eq!(item.name, "Milk");
        assert!(!item.checked);
        assert_eq!(item.added_by_uid, "u1");
        assert_eq!(item.category.as_deref(), Some("Other"));
        assert!(item.created_at.is_some());
    }

    #[tokio::test]
    async fn test_add_item_rejections_write_nothing() {
        let (store, coordinator) = setup();
        seed_item(&store, "i1", "Milk", "Other", false, 1);
        let before = store.commit_count();
        let ctx = context(&store);

        assert!(matches!(
            coordinator.add_item(&ctx, "MILK", None).await,
            Err(PantryError::DuplicateItem { existing_id, .. }) if existing_id == "i1"
        ));
        assert!(matches!(
            coordinator.add_item(&ctx, "   ", None).await,
            Err(PantryError::EmptyName(_))
        ));
        assert!(matches!(
            coordinator.add_item(&ctx, "Bread", Some("Bakery")).await,
            Err(PantryError::UnknownCategory(_))
        ));
        assert_eq!(store.commit_count(), before);
    }

    #[tokio::test]
    async fn test_toggle_item_flips_only_that_item() {
        let (store, coordinator) = setup();
        seed_item(&store, "i1", "Milk", "Other", false, 1);
        seed_item(&store, "i2", "Bread", "Other", false, 2);

        assert!(coordinator.toggle_item(&context(&store), "i1").await.unwrap());
        let ctx = context(&store);
        assert!(ctx.items[0].checked);
        assert!(!ctx.items[1].checked);

        assert!(matches!(
            coordinator.toggle_item(&ctx, "nope").await,
            Err(PantryError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_all_twice_restores_state() {
        let (store, coordinator) = setup();
        seed_item(&store, "i1", "Milk", "Other", true, 1);
        seed_item(&store, "i2", "Bread", "Other", true, 2);
        fn checked(store: &MemoryStore) -> Vec<bool> {
            context(store).items.iter().map(|i| i.checked).collect()
        }

        assert_eq!(coordinator.toggle_all(&context(&store)).await.unwrap(), Some(false));
        assert_eq!(checked(&store), vec![false, false]);
        assert_eq!(coordinator.toggle_all(&context(&store)).await.unwrap(), Some(true));
        assert_eq!(checked(&store), vec![true, true]);
    }

    #[tokio::test]
    async fn test_toggle_all_from_mixed_checks_everything() {
        let (store, coordinator) = setup();
        seed_item(&store, "i1", "Milk", "Other", true, 1);
        seed_item(&store, "i2", "Bread", "Other", false, 2);
        let before = store.commit_count();

        assert_eq!(coordinator.toggle_all(&context(&store)).await.unwrap(), Some(true));
        assert_eq!(store.commit_count(), before + 1);
        assert!(context(&store).items.iter().all(|i| i.checked));
    }

    #[tokio::test]
    async fn test_toggle_all_on_empty_list_is_noop() {
        let (store, coordinator) = setup();
        assert_eq!(coordinator.toggle_all(&context(&store)).await.unwrap(), None);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_completed() {
        let (store, coordinator) = setup();
        seed_item(&store, "i1", "Milk", "Other", false, 1);
        seed_item(&store, "i2", "Apple", "Other", true, 2);
        let before = store.commit_count();

        assert_eq!(coordinator.clear_completed(&context(&store)).await.unwrap(), 1);
        assert_eq!(store.commit_count(), before + 1);
        let names: Vec<_> = context(&store).items.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Milk"]);

        assert_eq!(coordinator.clear_completed(&context(&store)).await.unwrap(), 0);
        assert_eq!(store.commit_count(), before + 1);
    }

    #[tokio::test]
    async fn test_add_category_rejects_duplicates_without_writing() {
        let (store, coordinator) = setup();
        seed_category(&store, "c1", "Produce", 1);
        let before = store.commit_count();

        assert!(matches!(
            coordinator.add_category(&context(&store), "  produce  ").await,
            Err(PantryError::DuplicateCategory(_))
        ));
        assert_eq!(store.commit_count(), before);

        coordinator
            .add_category(&context(&store), "Dairy")
            .await
            .unwrap();
        let names: Vec<_> = context(&store).categories.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Produce", "Dairy"]);
    }

    #[tokio::test]
    async fn test_delete_category_reassigns_in_one_batch() {
        let (store, coordinator) = setup();
        seed_category(&store, "c1", "Dairy", 1);
        seed_category(&store, "c2", "Produce", 2);
        seed_item(&store, "i1", "Milk", "Dairy", false, 3);
        seed_item(&store, "i2", "Cheese", "Dairy", true, 4);
        seed_item(&store, "i3", "Apple", "Produce", false, 5);
        let before = store.commit_count();

        let moved = coordinator
            .delete_category(&context(&store), "c1")
            .await
            .unwrap();

        assert_eq!(moved, 2);
        assert_eq!(store.commit_count(), before + 1);
        let ctx = context(&store);
        assert_eq!(ctx.categories.len(), 1);
        let categories: Vec<_> = ctx.items.iter().map(|i| i.category.as_deref()).collect();
        assert_eq!(categories, vec![Some("Other"), Some("Other"), Some("Produce")]);
    }

    #[tokio::test]
    async fn test_delete_unknown_category() {
        let (store, coordinator) = setup();
        assert!(matches!(
            coordinator.delete_category(&context(&store), "missing").await,
            Err(PantryError::CategoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_partial_state() {
        let (store, coordinator) = setup();
        seed_category(&store, "c1", "Dairy", 1);
        seed_item(&store, "i1", "Milk", "Dairy", false, 2);
        store.fail_next_writes(1);

        let err = coordinator
            .delete_category(&context(&store), "c1")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.is_recoverable());

        let ctx = context(&store);
        assert_eq!(ctx.categories.len(), 1);
        assert_eq!(ctx.items[0].category.as_deref(), Some("Dairy"));
    }

    #[tokio::test]
    async fn test_add_shortcuts_all_or_nothing() {
        let (store, coordinator) = setup();
        coordinator
            .add_shortcuts(&context(&store), "Milk")
            .await
            .unwrap();
        let before = store.commit_count();

        match coordinator
            .add_shortcuts(&context(&store), "Milk, milk, Bread")
            .await
        {
            Err(PantryError::DuplicateShortcuts(names)) => assert_eq!(names, vec!["Milk", "milk"]),
            other => panic!("expected DuplicateShortcuts, got {other:?}"),
        }
        assert_eq!(store.commit_count(), before);
        assert_eq!(context(&store).shortcuts.len(), 1);

        let added = coordinator
            .add_shortcuts(&context(&store), "Eggs, Bread, Butter")
            .await
            .unwrap();
        assert_eq!(added, vec!["Eggs", "Bread", "Butter"]);
        let names: Vec<_> = context(&store).shortcuts.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Milk", "Eggs", "Bread", "Butter"]);
    }

    #[tokio::test]
    async fn test_delete_and_clear_shortcuts() {
        let (store, coordinator) = setup();
        coordinator
            .add_shortcuts(&context(&store), "Milk, Eggs, Bread")
            .await
            .unwrap();

        coordinator
            .delete_shortcut(&context(&store), "eggs")
            .await
            .unwrap();
        assert_eq!(context(&store).shortcuts.len(), 2);
        assert!(matches!(
            coordinator.delete_shortcut(&context(&store), "Tea").await,
            Err(PantryError::ShortcutNotFound(_))
        ));

        let outcome = coordinator
            .execute(&context(&store), &ConfirmAction::ClearShortcuts)
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::ShortcutsCleared(2));
        assert!(context(&store).shortcuts.is_empty());
    }
}
