use serde_json::json;

use super::{Sandbox, SandboxOptions, print_json};
use crate::display::{ItemLineOptions, format_item_line, format_view_summary};
use crate::error::{PantryError, Result};
use crate::types::Item;
use crate::utils::names_match;

/// Find an item by exact id, then by case-insensitive name.
fn find_item<'a>(items: &'a [Item], key: &str) -> Result<&'a Item> {
    items
        .iter()
        .find(|i| i.id == key)
        .or_else(|| items.iter().find(|i| names_match(&i.name, key)))
        .ok_or_else(|| PantryError::ItemNotFound(key.trim().to_string()))
}

/// Show the list through the category filter and search
pub async fn cmd_ls(
    options: &SandboxOptions,
    category: Option<&str>,
    search: Option<&str>,
    show_ids: bool,
    output_json: bool,
) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();
    if let Some(label) = category {
        session.set_filter_category(label);
    }
    if let Some(text) = search {
        session.set_search(text);
    }
    let state = session.state();

    if output_json {
        return print_json(&json!({
            "filter": state.filter,
            "items": state.view.items,
            "checked_count": state.view.checked_count,
            "all_checked": state.view.all_checked,
            "total": state.view.total,
        }));
    }

    let sentinel = &session.config().sentinel_category;
    if let Some(group) = &state.group {
        println!("{}", group.name);
    }
    let line_options = ItemLineOptions {
        show_id: show_ids,
        ..Default::default()
    };
    for item in &state.view.items {
        println!(
            "{}",
            format_item_line(item, &state.members, sentinel, &line_options)
        );
    }
    println!("{}", format_view_summary(&state.view));
    Ok(())
}

pub async fn cmd_add(options: &SandboxOptions, name: &str, category: Option<&str>, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();

    let id = match session.add_item(name, category).await {
        Ok(id) => id,
        Err(e) => {
            // Point at the item that blocked the add before failing.
            let state = session.state();
            if let Some(hit) = &state.duplicate
                && let Ok(existing) = find_item(&state.items, &hit.id)
            {
                eprintln!(
                    "{}",
                    format_item_line(
                        existing,
                        &state.members,
                        &session.config().sentinel_category,
                        &ItemLineOptions {
                            highlight: Some(hit),
                            show_id: true,
                        },
                    )
                );
            }
            return Err(e);
        }
    };
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({
            "id": id,
            "action": "added",
        }))?;
    } else {
        println!("Added {}", id);
    }
    Ok(())
}

/// Flip one item, addressed by id or name
pub async fn cmd_toggle(options: &SandboxOptions, key: &str, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();

    let id = find_item(&session.state().items, key)?.id.clone();
    let checked = session.toggle_item(&id).await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({
            "id": id,
            "checked": checked,
        }))?;
    } else {
        println!("{} {}", if checked { "Checked" } else { "Unchecked" }, id);
    }
    Ok(())
}

pub async fn cmd_toggle_all(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;

    let target = sandbox.session().toggle_all().await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({ "checked": target }))?;
    } else {
        match target {
            Some(true) => println!("Checked every item"),
            Some(false) => println!("Unchecked every item"),
            None => println!("The list is empty"),
        }
    }
    Ok(())
}

pub async fn cmd_clear_completed(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;

    let removed = sandbox.session().clear_completed().await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({ "removed": removed }))?;
    } else {
        println!("Removed {removed} checked item(s)");
    }
    Ok(())
}
