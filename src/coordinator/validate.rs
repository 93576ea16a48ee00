//! Checks that run before any store call.

use crate::error::{PantryError, Result};
use crate::types::{Category, Item, QuickAddShortcut};
use crate::utils::{names_match, split_submission, validate_name};

/// Validate a new item name against the current list.
///
/// Returns the trimmed name, or `DuplicateItem` pointing at the existing
/// item it collides with.
pub fn check_new_item(name: &str, items: &[Item]) -> Result<String> {
    let name = validate_name(name, "item")?;
    if let Some(existing) = items.iter().find(|i| names_match(&i.name, &name)) {
        return Err(PantryError::DuplicateItem {
            name,
            existing_id: existing.id.clone(),
            existing_name: existing.name.clone(),
        });
    }
    Ok(name)
}

/// Resolve the category a new item files under.
///
/// A missing or blank choice means the sentinel. Otherwise the choice must
/// name an existing category (matched case-insensitively, stored with the
/// category's own spelling) or the sentinel itself.
pub fn resolve_item_category(
    category: Option<&str>,
    categories: &[Category],
    sentinel: &str,
) -> Result<String> {
    let Some(choice) = category.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(sentinel.to_string());
    };
    if let Some(existing) = categories
        .iter()
        .find(|c| c.name == choice)
        .or_else(|| categories.iter().find(|c| names_match(&c.name, choice)))
    {
        return Ok(existing.name.clone());
    }
    if names_match(choice, sentinel) {
        return Ok(sentinel.to_string());
    }
    Err(PantryError::UnknownCategory(choice.to_string()))
}

/// Validate a new category name; duplicates compare case-insensitively.
pub fn check_new_category(name: &str, categories: &[Category]) -> Result<String> {
    let name = validate_name(name, "category")?;
    if categories.iter().any(|c| names_match(&c.name, &name)) {
        return Err(PantryError::DuplicateCategory(name));
    }
    Ok(name)
}

/// Split and validate a multi-name shortcut submission.
///
/// The whole submission is rejected if any name collides, either with an
/// existing shortcut or with an earlier name in the same submission. The
/// error lists every colliding name in submission order.
pub fn parse_shortcut_submission(
    input: &str,
    separator: &str,
    existing: &[QuickAddShortcut],
) -> Result<Vec<String>> {
    let parts = split_submission(input, separator);
    if parts.is_empty() {
        return Err(PantryError::EmptyName("shortcut"));
    }

    let mut accepted: Vec<String> = Vec::with_capacity(parts.len());
    let mut collisions = Vec::new();
    for part in parts {
        let name = validate_name(&part, "shortcut")?;
        let taken = existing.iter().any(|s| names_match(&s.name, &name))
            || accepted.iter().any(|a| names_match(a, &name));
        if taken {
            collisions.push(name.clone());
        }
        accepted.push(name);
    }

    if !collisions.is_empty() {
        return Err(PantryError::DuplicateShortcuts(collisions));
    }
    Ok(accepted)
}
