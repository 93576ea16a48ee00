//! Shared error type for remote store adapters.
//!
//! Adapters convert their backend-specific failures into a [`StoreError`] so
//! the rest of the engine can decide between "show a transient message and let
//! the user retry" and "this request can never succeed as written".

use std::fmt;

/// What went wrong inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The store could not be reached or dropped the request.
    Unavailable,
    /// The store refused the write (permissions, quota, rules).
    Rejected,
    /// A batch referenced a document that does not exist.
    MissingDocument,
    /// The request was cancelled before it completed.
    Aborted,
}

enum_display!(
    StoreErrorKind,
    {
        Unavailable => "unavailable",
        Rejected => "rejected",
        MissingDocument => "missing_document",
        Aborted => "aborted",
    }
);

/// Error reported by a [`RemoteStore`](super::RemoteStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl StoreError {
    /// Create a new store error with the given kind and message.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn missing_document(path: impl fmt::Display) -> Self {
        Self::new(
            StoreErrorKind::MissingDocument,
            format!("no document at '{path}'"),
        )
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Unavailable | StoreErrorKind::Aborted
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for StoreError {}
