//! Domain-level error type shared by all livetext crates.

/// A domain error, independent of any transport.
///
/// The hub maps these onto HTTP statuses / WebSocket error messages;
/// repositories and managers return them directly.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity was not found.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The operation conflicts with current state (e.g. an element is
    /// already claimed by another editing session).
    #[error("{0}")]
    Conflict(String),

    /// The caller lacks a sufficient role for the operation.
    #[error("{0}")]
    Forbidden(String),

    /// An internal failure that should not be shown verbatim to users.
    #[error("{0}")]
    Internal(String),
}
