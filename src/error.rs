use thiserror::Error;

use crate::remote::error::StoreError;

/// Coarse classification of a [`PantryError`], used by the presentation layer
/// to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any store call (empty or duplicate names, unknown ids).
    Validation,
    /// A document the session depends on does not exist.
    NotFound,
    /// The store rejected or did not complete a read or write.
    WriteFailure,
    /// Local misuse or I/O outside the store.
    Internal,
}

enum_display!(
    ErrorKind,
    {
        Validation => "validation",
        NotFound => "not_found",
        WriteFailure => "write_failure",
        Internal => "internal",
    }
);

#[derive(Error, Debug)]
pub enum PantryError {
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),

    #[error("{entity} name too long: {actual} characters (max: {max})")]
    NameTooLong {
        entity: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{0} name cannot contain control characters or newlines")]
    InvalidName(&'static str),

    #[error("'{name}' is already on the list")]
    DuplicateItem {
        name: String,
        existing_id: String,
        existing_name: String,
    },

    #[error("category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("already exists: {}", .0.join(", "))]
    DuplicateShortcuts(Vec<String>),

    #[error("category '{0}' does not exist")]
    UnknownCategory(String),

    #[error("item '{0}' not found")]
    ItemNotFound(String),

    #[error("category '{0}' not found")]
    CategoryNotFound(String),

    #[error("quick-add shortcut '{0}' not found")]
    ShortcutNotFound(String),

    #[error("no profile found for user '{0}'")]
    UserNotFound(String),

    #[error("user '{0}' does not belong to a group")]
    MissingGroupId(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("group code '{0}' not found, please check and try again")]
    GroupCodeNotFound(String),

    #[error("no group is bound to this session")]
    NotBound,

    #[error("nothing is waiting for confirmation")]
    NoPendingConfirmation,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("store did not respond within {0}s")]
    StoreTimeout(u64),

    #[error("unknown collection '{0}'")]
    InvalidCollection(String),

    #[error("malformed document at '{path}': {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl PantryError {
    /// Map this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PantryError::EmptyName(_)
            | PantryError::NameTooLong { .. }
            | PantryError::InvalidName(_)
            | PantryError::DuplicateItem { .. }
            | PantryError::DuplicateCategory(_)
            | PantryError::DuplicateShortcuts(_)
            | PantryError::UnknownCategory(_)
            | PantryError::ItemNotFound(_)
            | PantryError::CategoryNotFound(_)
            | PantryError::ShortcutNotFound(_)
            | PantryError::GroupCodeNotFound(_) => ErrorKind::Validation,

            PantryError::UserNotFound(_)
            | PantryError::MissingGroupId(_)
            | PantryError::GroupNotFound(_) => ErrorKind::NotFound,

            PantryError::Store(_) | PantryError::StoreTimeout(_) => ErrorKind::WriteFailure,

            PantryError::NotBound
            | PantryError::NoPendingConfirmation
            | PantryError::InvalidCollection(_)
            | PantryError::MalformedDocument { .. }
            | PantryError::Io(_)
            | PantryError::YamlParse(_)
            | PantryError::Json(_)
            | PantryError::Config(_)
            | PantryError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether the session can carry on after this error. Only confirmed
    /// absence of the user's profile or group ends the session.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::NotFound
    }

    /// Whether repeating the same action may succeed without user changes.
    pub fn is_transient(&self) -> bool {
        match self {
            PantryError::Store(e) => e.is_transient(),
            PantryError::StoreTimeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PantryError>;
