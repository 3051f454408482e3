//! Identifiers and enumerations used across Tavern.
//!
//! Every enumeration has a lowercase string form (the one stored and sent
//! to clients), a [`FromStr`] impl that rejects unknown values with
//! [`ProtocolError::InvalidValue`], and a matching serde representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A verified caller identity, as issued by the identity layer.
///
/// Newtype over `u64` so an identity can never be passed where a session
/// id is expected. Serializes as the bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Internal id of a session. Clients should prefer the public token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Id of a message. Unique across all sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Id of a dice roll record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RollId(pub u64);

impl fmt::Display for RollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProfileRole
// ---------------------------------------------------------------------------

/// Account-level role stored on a profile.
///
/// This is informational for the access layer: session rights come from
/// ownership and participation, never from the profile role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    #[default]
    Player,
    Gm,
    Admin,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Gm => "gm",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileRole {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "gm" => Ok(Self::Gm),
            "admin" => Ok(Self::Admin),
            other => Err(ProtocolError::InvalidValue {
                field: "profile role",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a session.
///
/// ```text
///   Active ⇄ Paused
///      │       │
///      └───┬───┘
///          ▼
///      Completed   (terminal)
/// ```
///
/// - **Active**: accepting joins, messages, and dice rolls.
/// - **Paused**: members can still talk, but nobody joins and nobody rolls.
/// - **Completed**: read-only history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if new participants may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if dice may be rolled.
    pub fn allows_rolls(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if messages may be appended.
    pub fn allows_messages(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Returns `true` if moving from `self` to `target` is a legal
    /// transition. Staying in the same status is not a transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Paused, Self::Completed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(ProtocolError::InvalidValue {
                field: "session status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ParticipantRole
// ---------------------------------------------------------------------------

/// Role of a participant inside one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[default]
    Player,
    Gm,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Gm => "gm",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Self::Player),
            "gm" => Ok(Self::Gm),
            other => Err(ProtocolError::InvalidValue {
                field: "participant role",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageRole
// ---------------------------------------------------------------------------

/// Who produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Content typed by a human participant.
    #[default]
    User,
    /// Automated or AI-authored narration.
    Model,
    /// Notices produced by the engine itself (roll announcements, etc.).
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            "system" => Ok(Self::System),
            other => Err(ProtocolError::InvalidValue {
                field: "message role",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// DiceType
// ---------------------------------------------------------------------------

/// A standard polyhedral die.
///
/// Parsed case-insensitively from the usual notation (`"d20"`, `"D6"`).
/// Serializes lowercase; deserializes through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiceType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DiceType {
    /// All supported dice, smallest first.
    pub const ALL: [DiceType; 7] = [
        Self::D4,
        Self::D6,
        Self::D8,
        Self::D10,
        Self::D12,
        Self::D20,
        Self::D100,
    ];

    /// Number of faces. Outcomes fall in `1..=sides()`.
    pub fn sides(&self) -> u32 {
        match self {
            Self::D4 => 4,
            Self::D6 => 6,
            Self::D8 => 8,
            Self::D10 => 10,
            Self::D12 => 12,
            Self::D20 => 20,
            Self::D100 => 100,
        }
    }
}

impl Default for DiceType {
    fn default() -> Self {
        Self::D20
    }
}

impl fmt::Display for DiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

impl FromStr for DiceType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidValue {
            field: "dice type",
            value: s.to_string(),
        };
        let digits = s
            .trim()
            .strip_prefix(['d', 'D'])
            .ok_or_else(invalid)?;
        let sides: u32 = digits.parse().map_err(|_| invalid())?;
        Self::ALL
            .into_iter()
            .find(|d| d.sides() == sides)
            .ok_or_else(invalid)
    }
}

impl<'de> Deserialize<'de> for DiceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let notation = String::deserialize(deserializer)?;
        notation.parse().map_err(de::Error::custom)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identifiers
    // =====================================================================

    #[test]
    fn test_identity_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&IdentityId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_ids_display_with_prefix() {
        assert_eq!(IdentityId(7).to_string(), "U-7");
        assert_eq!(SessionId(3).to_string(), "S-3");
        assert_eq!(MessageId(9).to_string(), "M-9");
        assert_eq!(RollId(1).to_string(), "D-1");
    }

    // =====================================================================
    // SessionStatus
    // =====================================================================

    #[test]
    fn test_session_status_transitions() {
        use SessionStatus::*;
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Paused.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Paused));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_session_status_gates() {
        assert!(SessionStatus::Active.is_joinable());
        assert!(!SessionStatus::Paused.is_joinable());
        assert!(SessionStatus::Paused.allows_messages());
        assert!(!SessionStatus::Paused.allows_rolls());
        assert!(!SessionStatus::Completed.allows_messages());
    }

    #[test]
    fn test_session_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }

    #[test]
    fn test_session_status_parse_unknown_returns_error() {
        let err = "archived".parse::<SessionStatus>().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidValue { field: "session status", .. }
        ));
    }

    // =====================================================================
    // Roles
    // =====================================================================

    #[test]
    fn test_message_role_parse_and_display_agree() {
        for role in [MessageRole::User, MessageRole::Model, MessageRole::System] {
            assert_eq!(role.as_str().parse::<MessageRole>().unwrap(), role);
        }
        assert!("narrator".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_participant_role_rejects_admin() {
        assert!("admin".parse::<ParticipantRole>().is_err());
        assert_eq!("gm".parse::<ParticipantRole>().unwrap(), ParticipantRole::Gm);
        assert_eq!("admin".parse::<ProfileRole>().unwrap(), ProfileRole::Admin);
    }

    // =====================================================================
    // DiceType
    // =====================================================================

    #[test]
    fn test_dice_type_parse_standard_dice() {
        assert_eq!("d20".parse::<DiceType>().unwrap(), DiceType::D20);
        assert_eq!("D6".parse::<DiceType>().unwrap(), DiceType::D6);
        assert_eq!("d100".parse::<DiceType>().unwrap().sides(), 100);
    }

    #[test]
    fn test_dice_type_parse_malformed_returns_error() {
        for bad in ["", "d", "20", "d7", "dx", "2d6", "d-4"] {
            assert!(bad.parse::<DiceType>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_dice_type_display_matches_notation() {
        assert_eq!(DiceType::D12.to_string(), "d12");
        let json = serde_json::to_string(&DiceType::D8).unwrap();
        assert_eq!(json, "\"d8\"");
    }

    #[test]
    fn test_dice_type_deserialize_accepts_parse_notation() {
        let cases = [
            ("\"d6\"", DiceType::D6),
            ("\"D6\"", DiceType::D6),
            ("\" d20\"", DiceType::D20),
        ];
        for (json, dice) in cases {
            assert_eq!(serde_json::from_str::<DiceType>(json).unwrap(), dice, "{json}");
        }
        for bad in ["\"d7\"", "\"six\"", "6"] {
            assert!(serde_json::from_str::<DiceType>(bad).is_err(), "{bad}");
        }
    }
}
