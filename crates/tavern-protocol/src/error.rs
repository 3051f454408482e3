//! Error taxonomy shared by every Tavern crate.
//!
//! Each crate defines its own error enum, but all of them map onto the
//! same small set of [`ErrorKind`]s. Callers branch on the kind; the
//! enum variants carry the detail for logs.

use std::fmt;

/// The kind of failure an operation reported.
///
/// `Forbidden` is deliberately uninformative: a caller outside a session
/// gets it whether the session exists or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The resource does not exist (only reported to callers who could
    /// otherwise see it).
    NotFound,
    /// The authorization policy denied the operation.
    Forbidden,
    /// The session already holds `max_players` participants.
    CapacityExceeded,
    /// Duplicate join or duplicate username.
    AlreadyExists,
    /// An argument was out of range, malformed, or not a known enum value.
    Validation,
    /// A concurrent game-state write won the race. Retry with fresh state.
    Conflict,
    /// The session's status does not allow the operation.
    InvalidState,
    /// The storage side is gone (actor stopped, channel closed).
    Unavailable,
}

impl ErrorKind {
    /// Returns `true` for failures caused by the infrastructure rather than
    /// by the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Returns `true` when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::AlreadyExists => "already_exists",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::InvalidState => "invalid_state",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Validation failures raised while building or parsing protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A string did not name any variant of the expected enumeration.
    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    /// A number fell outside its allowed range (inclusive bounds).
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A required text field was empty after trimming.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl ProtocolError {
    /// Protocol errors are always validation failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    /// Checks `value` against an inclusive range.
    pub fn check_range(
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<(), Self> {
        if value < min || value > max {
            return Err(Self::OutOfRange {
                field,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_accepts_bounds() {
        assert!(ProtocolError::check_range("max_players", 1, 1, 10).is_ok());
        assert!(ProtocolError::check_range("max_players", 10, 1, 10).is_ok());
    }

    #[test]
    fn test_check_range_rejects_outside() {
        let err = ProtocolError::check_range("max_players", 11, 1, 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "max_players must be between 1 and 10, got 11"
        );
    }

    #[test]
    fn test_error_kind_retryable() {
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::Unavailable.is_retryable());
        assert!(!ErrorKind::Forbidden.is_retryable());
        assert!(ErrorKind::Unavailable.is_infrastructure());
        assert!(!ErrorKind::NotFound.is_infrastructure());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::CapacityExceeded.to_string(), "capacity_exceeded");
        assert_eq!(ErrorKind::Forbidden.to_string(), "forbidden");
    }
}
