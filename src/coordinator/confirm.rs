//! Two-phase confirmation for destructive actions.

use serde::Serialize;

/// Destructive action waiting for the user to confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmAction {
    /// Delete every quick-add shortcut in the group
    ClearShortcuts,
}

/// A requested action plus the message to confirm it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConfirmation {
    pub message: String,
    pub action: ConfirmAction,
}

impl PendingConfirmation {
    pub fn new(message: String, action: ConfirmAction) -> Self {
        Self { message, action }
    }

    pub fn clear_shortcuts(count: usize) -> Self {
        let message = if count == 1 {
            "Delete the quick-add shortcut? This cannot be undone.".to_string()
        } else {
            format!("Delete all {count} quick-add shortcuts? This cannot be undone.")
        };
        Self::new(message, ConfirmAction::ClearShortcuts)
    }
}

/// Result of an executed confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    ShortcutsCleared(usize),
}
