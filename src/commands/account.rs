use owo_colors::OwoColorize;
use serde_json::json;

use super::{Sandbox, SandboxOptions, print_json};
use crate::display::{format_member_line, format_session_state};
use crate::error::{ErrorKind, PantryError, Result};
use crate::identity::Identity;
use crate::onboarding::{GroupChoice, RegisterRequest, register};

/// Register the sandbox user, founding a group or joining one by code
pub async fn cmd_register(
    options: &SandboxOptions,
    name: Option<&str>,
    create: Option<&str>,
    join: Option<&str>,
    output_json: bool,
) -> Result<()> {
    let group = match (create, join) {
        (Some(name), None) => GroupChoice::Create {
            name: name.to_string(),
        },
        (None, Some(code)) => GroupChoice::Join {
            code: code.to_string(),
        },
        _ => {
            return Err(PantryError::Other(
                "pass exactly one of --create or --join".to_string(),
            ));
        }
    };

    let sandbox = Sandbox::open(options)?;
    let request = RegisterRequest {
        uid: sandbox.uid().to_string(),
        email: sandbox.email().map(str::to_string),
        name: name.map(str::to_string),
        group,
    };
    let group_id = register(sandbox.store(), request).await?;
    sandbox.bind().await?;
    sandbox.save()?;

    let state = sandbox.session().state();
    let group_name = state.group.as_ref().map(|g| g.name.clone()).unwrap_or_default();
    if output_json {
        print_json(&json!({
            "uid": sandbox.uid(),
            "group_id": group_id,
            "group_name": group_name,
        }))?;
    } else {
        println!("Registered {} in {} ({})", sandbox.uid(), group_name.cyan(), group_id);
        println!("{}", format!("Share the code {group_id} to invite others").dimmed());
    }
    Ok(())
}

/// Show where the sandbox user's session ends up. A missing profile or
/// group is reported, not treated as a failure.
pub async fn cmd_status(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    let session = sandbox.session();
    let identity = Identity::new(sandbox.uid(), sandbox.email().map(str::to_string));
    match session.handle_identity(Some(identity)).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    session.flush().await;
    let state = session.state();

    if output_json {
        return print_json(&json!({
            "session": state.session,
            "group": state.group.as_ref().map(|g| json!({"id": g.id, "name": g.name})),
            "items": state.items.len(),
            "categories": state.categories.len(),
            "shortcuts": state.shortcuts.len(),
            "members": state.members.len(),
        }));
    }

    println!("{}", format_session_state(&state.session));
    if let Some(group) = &state.group {
        println!("{}: {}", "group".cyan(), group.name);
        println!(
            "{} items, {} categories, {} shortcuts, {} members",
            state.items.len(),
            state.categories.len(),
            state.shortcuts.len(),
            state.members.len()
        );
    }
    Ok(())
}

pub async fn cmd_members(options: &SandboxOptions, output_json: bool) -> Result<()> {
    let sandbox = Sandbox::open(options)?;
    sandbox.bind().await?;
    let state = sandbox.session().state();

    if output_json {
        return print_json(&state.members);
    }
    for member in &state.members {
        println!("{}", format_member_line(member));
    }
    Ok(())
}
