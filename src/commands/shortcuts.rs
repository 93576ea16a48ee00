use owo_colors::OwoColorize;
use serde_json::json;

use super::{Sandbox, SandboxOptions, print_json};
use crate::coordinator::ActionOutcome;
use crate::display::{format_confirmation, format_shortcut_line};
use crate::error::Result;
use crate::session::TapOutcome;

/// Add one or more shortcuts from a separator-delimited list
pub async fn cmd_shortcut_add(options: &SandboxOptions, input: &str, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;

    let added = sandbox.session().add_shortcuts(input).await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({ "added": added }))?;
    } else {
        for name in &added {
            println!("Added shortcut {name}");
        }
    }
    Ok(())
}

pub async fn cmd_shortcut_rm(options: &SandboxOptions, name: &str, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;

    let id = sandbox.session().delete_shortcut(name).await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({
            "id": id,
            "action": "deleted",
        }))?;
    } else {
        println!("Deleted shortcut {}", name.trim());
    }
    Ok(())
}

/// Delete every shortcut. Without `confirmed` only the prompt is shown.
pub async fn cmd_shortcut_clear(options: &SandboxOptions, confirmed: bool, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();

    let pending = session.request_clear_shortcuts()?;
    if !confirmed {
        session.cancel_pending();
        if output_json {
            print_json(&json!({
                "confirmed": false,
                "message": pending.message,
            }))?;
        } else {
            println!("{}", format_confirmation(&pending));
            println!("{}", "Re-run with --yes to confirm".dimmed());
        }
        return Ok(());
    }

    let ActionOutcome::ShortcutsCleared(removed) = session.confirm_pending().await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({
            "confirmed": true,
            "removed": removed,
        }))?;
    } else {
        println!("Removed {removed} shortcut(s)");
    }
    Ok(())
}

/// Add the item a shortcut names
pub async fn cmd_shortcut_tap(
    options: &SandboxOptions,
    name: &str,
    category: Option<&str>,
    output_json: bool,
) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let session = sandbox.session();
    session.set_composer_category(category);

    let outcome = session.tap_shortcut(name).await?;
    sandbox.settle().await;
    sandbox.save()?;

    if output_json {
        print_json(&json!({ "outcome": outcome }))?;
    } else {
        match outcome {
            TapOutcome::Added(id) => println!("Added {id}"),
            TapOutcome::AlreadyAdded => println!("Already added"),
        }
    }
    Ok(())
}

pub async fn cmd_shortcut_ls(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let state = sandbox.session().state();

    if output_json {
        return print_json(&state.shortcuts);
    }
    if state.shortcuts.is_empty() {
        println!("No quick-add shortcuts");
    }
    for shortcut in &state.shortcuts {
        println!("{}", format_shortcut_line(shortcut));
    }
    Ok(())
}
