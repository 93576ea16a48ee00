//! Terminal rendering for the sandbox binary.

use owo_colors::OwoColorize;

use crate::coordinator::PendingConfirmation;
use crate::members::{display_name_for, initials_of};
use crate::session::{NoGroupReason, SessionState};
use crate::types::{Category, Item, MemberProfile, QuickAddShortcut};
use crate::view::{DerivedView, DuplicateHit};

/// Format options for item lines
#[derive(Default)]
pub struct ItemLineOptions<'a> {
    /// Item to highlight as the target of a rejected duplicate add
    pub highlight: Option<&'a DuplicateHit>,
    pub show_id: bool,
}

/// Format an item for single-line display
pub fn format_item_line(item: &Item, members: &[MemberProfile], sentinel: &str, options: &ItemLineOptions) -> String {
    let checkbox = if item.checked {
        "[x]".green().to_string()
    } else {
        "[ ]".to_string()
    };
    let name = if item.checked {
        item.name.dimmed().strikethrough().to_string()
    } else if options.highlight.is_some_and(|hit| hit.id == item.id) {
        item.name.yellow().bold().to_string()
    } else {
        item.name.clone()
    };
    let category = format!("({})", item.category_or(sentinel)).cyan().to_string();
    let author = display_name_for(Some(&item.added_by_uid), members);
    let id = if options.show_id {
        format!("{} ", item.id.dimmed())
    } else {
        String::new()
    };

    format!(
        "{id}{checkbox} {name} {category} {}",
        format!("· {}", author).dimmed()
    )
}

/// Summary line under the item list
pub fn format_view_summary(view: &DerivedView) -> String {
    let counts = format!("{}/{} checked", view.checked_count, view.total);
    let shown = if view.items.len() == view.total {
        String::new()
    } else {
        format!(", {} shown", view.items.len())
    };
    if view.all_checked {
        format!("{}{shown}", counts.green())
    } else {
        format!("{counts}{shown}")
    }
}

pub fn format_category_line(category: &Category, item_count: usize) -> String {
    format!(
        "{} {} {}",
        category.id.dimmed(),
        category.name.cyan(),
        format!("({item_count} items)").dimmed()
    )
}

pub fn format_shortcut_line(shortcut: &QuickAddShortcut) -> String {
    format!("- {}", shortcut.name.magenta())
}

/// Format a member with initials badge, display name, and avatar colour
pub fn format_member_line(member: &MemberProfile) -> String {
    let display = member.display_name();
    let badge = format!("[{}]", initials_of(Some(display))).bold().to_string();
    let email = member
        .email
        .as_deref()
        .filter(|e| *e != display)
        .map(|e| format!(" <{e}>").dimmed().to_string())
        .unwrap_or_default();
    format!(
        "{badge} {display}{email} {}",
        member.avatar_color.dimmed()
    )
}

pub fn format_session_state(state: &SessionState) -> String {
    match state {
        SessionState::Unauthenticated => "signed out".dimmed().to_string(),
        SessionState::ResolvingGroup { uid } => format!("resolving group for {uid}").yellow().to_string(),
        SessionState::Bound { uid, group_id } => {
            format!("{uid} in group {}", group_id.cyan())
        }
        SessionState::NoGroup { uid, reason } => {
            let hint = match reason {
                NoGroupReason::UserNotFound | NoGroupReason::MissingGroupId => {
                    " (run `pantry register` first)"
                }
                NoGroupReason::GroupNotFound | NoGroupReason::GroupRemoved => "",
            };
            format!("{uid}: {reason}{hint}").red().to_string()
        }
    }
}

pub fn format_confirmation(pending: &PendingConfirmation) -> String {
    pending.message.yellow().to_string()
}
