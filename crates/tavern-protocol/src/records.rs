//! Persisted records.
//!
//! One struct per logical table. The storage engine enforces the
//! relational guarantees (unique keys, cascades); these types only carry
//! the data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DiceType, IdentityId, MessageId, MessageRole, ParticipantRole,
    ProfileRole, RollId, SessionId, SessionStatus,
};

/// Free-form game variables. Ordered so snapshots serialize stably.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// The public profile of an identity. Exactly one per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: IdentityId,
    /// Globally unique when set. Stored lower-cased.
    pub username: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: ProfileRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collaborative game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Stable external reference, distinct from `id`. 32 hex characters.
    pub token: String,
    pub title: String,
    pub description: Option<String>,
    pub status: SessionStatus,
    /// Participant limit, 1..=10. The creator does not count against it.
    pub max_players: usize,
    pub creator: IdentityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of one identity in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub identity: IdentityId,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// One entry of a session's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    /// `None` for engine-authored notices.
    pub author: Option<IdentityId>,
    pub content: String,
    pub role: MessageRole,
    pub created_at: DateTime<Utc>,
}

/// The shared state document of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub session_id: SessionId,
    pub current_scene: Option<String>,
    pub variables: Variables,
    pub last_action: Option<String>,
    /// Incremented on every write. Writers pass the version they read to
    /// detect lost updates.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable audit record of a dice roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub id: RollId,
    pub session_id: SessionId,
    pub identity: Option<IdentityId>,
    pub dice_type: DiceType,
    pub count: u32,
    pub modifier: i32,
    /// Individual outcomes in roll order. `rolls.len() == count`.
    pub rolls: Vec<u32>,
    /// Sum of `rolls`.
    pub total: u32,
    /// `total + modifier`.
    pub final_result: i64,
    pub skill_name: Option<String>,
    pub success: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl DiceRoll {
    /// Returns `true` if the arithmetic invariants of the record hold.
    pub fn is_consistent(&self) -> bool {
        let sides = self.dice_type.sides();
        self.rolls.len() == self.count as usize
            && self.rolls.iter().all(|r| (1..=sides).contains(r))
            && self.rolls.iter().sum::<u32>() == self.total
            && self.final_result == i64::from(self.total) + i64::from(self.modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(rolls: Vec<u32>, total: u32, modifier: i32, final_result: i64) -> DiceRoll {
        DiceRoll {
            id: RollId(1),
            session_id: SessionId(1),
            identity: Some(IdentityId(1)),
            dice_type: DiceType::D6,
            count: rolls.len() as u32,
            modifier,
            rolls,
            total,
            final_result,
            skill_name: None,
            success: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_dice_roll_is_consistent_accepts_valid_record() {
        assert!(roll(vec![1, 6, 3], 10, 2, 12).is_consistent());
        assert!(roll(vec![4], 4, -5, -1).is_consistent());
    }

    #[test]
    fn test_dice_roll_is_consistent_rejects_bad_total() {
        assert!(!roll(vec![1, 6, 3], 11, 2, 13).is_consistent());
        assert!(!roll(vec![1, 6, 3], 10, 2, 10).is_consistent());
    }

    #[test]
    fn test_dice_roll_is_consistent_rejects_out_of_range_face() {
        assert!(!roll(vec![7], 7, 0, 7).is_consistent());
        assert!(!roll(vec![0], 0, 0, 0).is_consistent());
    }

    #[test]
    fn test_game_state_variables_serialize_in_key_order() {
        let mut variables = Variables::new();
        variables.insert("mp".into(), serde_json::json!(5));
        variables.insert("hp".into(), serde_json::json!(10));
        let state = GameState {
            session_id: SessionId(1),
            current_scene: None,
            variables,
            last_action: None,
            version: 1,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&state.variables).unwrap();
        assert_eq!(json, r#"{"hp":10,"mp":5}"#);
    }
}
