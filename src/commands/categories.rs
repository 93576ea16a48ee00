use serde_json::json;

use super::{Sandbox, SandboxOptions, print_json};
use crate::display::format_category_line;
use crate::error::{PantryError, Result};
use crate::types::Category;
use crate::utils::names_match;

fn find_category<'a>(categories: &'a [Category], key: &str) -> Result<&'a Category> {
    categories
        .iter()
        .find(|c| c.id == key)
        .or_else(|| categories.iter().find(|c| names_match(&c.name, key)))
        .ok_or_else(|| PantryError::CategoryNotFound(key.trim().to_string()))
}

pub async fn cmd_category_add(options: &SandboxOptions, name: &str, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;

    let id = sandbox.session().add_category(name).await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({
            "id": id,
            "name": name.trim(),
            "action": "added",
        }))?;
    } else {
        println!("Added category {} ({})", name.trim(), id);
    }
    Ok(())
}

/// Delete a category by id or name; its items move to the sentinel category
pub async fn cmd_category_rm(options: &SandboxOptions, key: &str, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();

    let category = find_category(&session.state().categories, key)?.clone();
    let moved = session.delete_category(&category.id).await?;
    sandbox.settle().await;
    sandbox.save()?;

    let sentinel = &session.config().sentinel_category;
    if output_json {
        print_json(&json!({
            "id": category.id,
            "name": category.name,
            "reassigned": moved,
            "reassigned_to": sentinel,
        }))?;
    } else {
        println!("Deleted category {}", category.name);
        if moved > 0 {
            println!("Moved {moved} item(s) to {sentinel}");
        }
    }
    Ok(())
}

pub async fn cmd_category_ls(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let state = sandbox.session().state();

    let counted: Vec<(&Category, usize)> = state
        .categories
        .iter()
        .map(|c| {
            let count = state
                .items
                .iter()
                .filter(|i| i.category.as_deref() == Some(c.name.as_str()))
                .count();
            (c, count)
        })
        .collect();

    if output_json {
        let entries: Vec<_> = counted
            .iter()
            .map(|(c, count)| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "items": count,
                })
            })
            .collect();
        return print_json(&entries);
    }

    if counted.is_empty() {
        println!("No categories");
    }
    for (category, count) in counted {
        println!("{}", format_category_line(category, count));
    }
    Ok(())
}
