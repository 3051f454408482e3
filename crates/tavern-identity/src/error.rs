//! Error types for the identity layer.

use tavern_protocol::{ErrorKind, IdentityId, ProtocolError};

/// Errors raised while verifying callers or managing profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The identity provider rejected the credential.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No profile exists for this identity yet.
    #[error("profile not found for {0}")]
    NotFound(IdentityId),

    /// The caller tried to change somebody else's profile.
    #[error("forbidden")]
    Forbidden,

    /// Another profile already uses this username.
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    /// A field failed validation.
    #[error(transparent)]
    Invalid(#[from] ProtocolError),
}

impl ProfileError {
    /// Maps the error onto the shared taxonomy.
    ///
    /// A failed credential is reported as `Forbidden`: the caller learns
    /// nothing about why it was rejected.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed(_) | Self::Forbidden => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UsernameTaken(_) => ErrorKind::AlreadyExists,
            Self::Invalid(e) => e.kind(),
        }
    }
}
