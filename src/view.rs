//! Derived view engine.
//!
//! Pure projections of the synchronized snapshots: the filtered item list
//! with its checked counts, composer category suggestion, and the category
//! filter options. [`ViewCache`] memoises the item projection on
//! `(items revision, filter)` so repeated reads between snapshots are free.

use serde::Serialize;

use crate::config::Config;
use crate::types::{Category, Item};
use crate::utils::contains_case_insensitive;

/// Category half of the item filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    /// Exact, case-sensitive match on the item's category name.
    Named(String),
}

impl CategoryFilter {
    /// Interpret a user-facing filter label; the configured "All" label
    /// disables category filtering.
    pub fn from_label(label: &str, config: &Config) -> Self {
        if label == config.all_categories_label {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(label.to_string())
        }
    }

    pub fn label<'a>(&'a self, config: &'a Config) -> &'a str {
        match self {
            CategoryFilter::All => &config.all_categories_label,
            CategoryFilter::Named(name) => name,
        }
    }
}

/// Category filter AND search text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ViewFilter {
    pub category: CategoryFilter,
    pub search: String,
}

impl ViewFilter {
    fn matches(&self, item: &Item, sentinel: &str) -> bool {
        let category_ok = match &self.category {
            CategoryFilter::All => true,
            CategoryFilter::Named(name) => item.category_or(sentinel) == name,
        };
        category_ok && contains_case_insensitive(&item.name, &self.search)
    }
}

/// The projection shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedView {
    /// Items passing the filter, in creation order.
    pub items: Vec<Item>,
    /// Checked items across the whole list, not only the filtered ones.
    pub checked_count: usize,
    /// Whether every item is checked. False for an empty list.
    pub all_checked: bool,
    pub total: usize,
}

/// Project `items` through `filter`. `sentinel` is the category items
/// without one read as.
pub fn derive_view(items: &[Item], filter: &ViewFilter, sentinel: &str) -> DerivedView {
    let checked_count = items.iter().filter(|i| i.checked).count();
    DerivedView {
        items: items
            .iter()
            .filter(|item| filter.matches(item, sentinel))
            .cloned()
            .collect(),
        checked_count,
        all_checked: !items.is_empty() && checked_count == items.len(),
        total: items.len(),
    }
}

/// Single-entry memo for [`derive_view`].
#[derive(Debug, Default)]
pub struct ViewCache {
    entry: Option<(u64, ViewFilter, DerivedView)>,
    computations: u64,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the view for `(revision, filter)`, recomputing only when
    /// either differs from the cached key.
    pub fn get(&mut self, revision: u64, items: &[Item], filter: &ViewFilter, sentinel: &str) -> &DerivedView {
        let fresh = matches!(&self.entry, Some((r, f, _)) if *r == revision && f == filter);
        if !fresh {
            self.entry = None;
        }
        let (_, _, view) = self.entry.get_or_insert_with(|| {
            self.computations += 1;
            (revision, filter.clone(), derive_view(items, filter, sentinel))
        });
        view
    }

    /// How many times the projection was actually computed.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}

/// The item a rejected add collided with, kept for highlighting until the
/// next successful add or a manual dismissal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateHit {
    pub id: String,
    pub name: String,
}

/// Category to preselect in the item composer.
///
/// Keeps `current` while it still names an existing category or the
/// sentinel; otherwise falls back to the first category, or `None` when
/// there are no categories.
pub fn suggest_category(categories: &[Category], current: Option<&str>, sentinel: &str) -> Option<String> {
    if let Some(current) = current
        && (current == sentinel || categories.iter().any(|c| c.name == current))
    {
        return Some(current.to_string());
    }
    categories.first().map(|c| c.name.clone())
}

/// Category filter choices: "All", every category in creation order, then
/// the sentinel.
pub fn filter_options(categories: &[Category], config: &Config) -> Vec<String> {
    let mut options = Vec::with_capacity(categories.len() + 2);
    options.push(config.all_categories_label.clone());
    options.extend(
        categories
            .iter()
            .filter(|c| c.name != config.sentinel_category)
            .map(|c| c.name.clone()),
    );
    options.push(config.sentinel_category.clone());
    options
}
