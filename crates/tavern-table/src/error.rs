//! Error types for the table layer.

use tavern_policy::Denied;
use tavern_protocol::{ErrorKind, IdentityId, MessageId, ProtocolError, SessionId};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The policy denied the request, or the session does not exist.
    /// Carries no detail.
    #[error("forbidden")]
    Forbidden,

    /// The session has no game state document yet.
    #[error("no game state for session {0}")]
    GameStateNotFound(SessionId),

    /// The message does not exist in this session.
    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    /// The identity has not joined this session.
    #[error("{0} is not a participant of session {1}")]
    ParticipantNotFound(IdentityId, SessionId),

    /// The session already has `max_players` participants.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The identity is already a member (participant or creator).
    #[error("{0} is already in session {1}")]
    AlreadyJoined(IdentityId, SessionId),

    /// A request value failed validation.
    #[error(transparent)]
    Invalid(#[from] ProtocolError),

    /// The game state changed since the writer read it.
    #[error("game state of session {session_id} is at version {actual}, expected {expected}")]
    Conflict {
        session_id: SessionId,
        expected: u64,
        actual: u64,
    },

    /// The session's status does not allow this operation.
    #[error("invalid session state for this operation: {0}")]
    InvalidState(String),

    /// The session's actor is gone or not responding.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),

    /// An export could not be encoded.
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Forbidden => ErrorKind::Forbidden,
            Self::GameStateNotFound(_)
            | Self::MessageNotFound(_)
            | Self::ParticipantNotFound(..) => ErrorKind::NotFound,
            Self::SessionFull(_) => ErrorKind::CapacityExceeded,
            Self::AlreadyJoined(..) => ErrorKind::AlreadyExists,
            Self::Invalid(e) => e.kind(),
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Unavailable(_) | Self::Export(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<Denied> for TableError {
    fn from(_: Denied) -> Self {
        Self::Forbidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_every_variant() {
        let cases = [
            (TableError::Forbidden, ErrorKind::Forbidden),
            (TableError::GameStateNotFound(SessionId(1)), ErrorKind::NotFound),
            (TableError::SessionFull(SessionId(1)), ErrorKind::CapacityExceeded),
            (
                TableError::AlreadyJoined(IdentityId(1), SessionId(1)),
                ErrorKind::AlreadyExists,
            ),
            (
                TableError::Invalid(ProtocolError::Empty("content")),
                ErrorKind::Validation,
            ),
            (
                TableError::Conflict {
                    session_id: SessionId(1),
                    expected: 1,
                    actual: 2,
                },
                ErrorKind::Conflict,
            ),
            (TableError::InvalidState("completed".into()), ErrorKind::InvalidState),
            (TableError::Unavailable(SessionId(1)), ErrorKind::Unavailable),
            (
                TableError::Export(serde_json::from_str::<u8>("x").unwrap_err()),
                ErrorKind::Unavailable,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_denied_converts_to_forbidden() {
        let err: TableError = Denied.into();
        assert!(matches!(err, TableError::Forbidden));
        assert_eq!(err.to_string(), "forbidden");
    }
}
