//! Unified error type for Tavern.

use tavern_identity::ProfileError;
use tavern_policy::Denied;
use tavern_protocol::{ErrorKind, ProtocolError};
use tavern_table::TableError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically. Match on
/// [`kind()`](Self::kind) rather than on the variants to react to a
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum TavernError {
    /// A value failed validation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Credential or profile failure.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Session, message, game state or dice failure.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl TavernError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(e) => e.kind(),
            Self::Profile(e) => e.kind(),
            Self::Table(e) => e.kind(),
            Self::Config(_) => ErrorKind::Validation,
        }
    }
}

impl From<Denied> for TavernError {
    fn from(_: Denied) -> Self {
        Self::Profile(ProfileError::Forbidden)
    }
}
