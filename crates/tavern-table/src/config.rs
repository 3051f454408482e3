//! Table configuration.

use serde::{Deserialize, Serialize};
use tavern_protocol::ProtocolError;

/// Hard upper bound on `max_players`. Configuration may tighten it, never
/// raise it.
pub const PLAYER_LIMIT: usize = 10;

/// Hard upper bound on `max_dice_count`. Keeps every roll total within
/// `u32` and the face list small.
pub const DICE_COUNT_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// TableConfig
// ---------------------------------------------------------------------------

/// Limits and behaviour shared by every session of a registry.
///
/// All fields have defaults, so a partial JSON object deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Smallest `max_players` a session may be created with.
    pub min_max_players: usize,

    /// Largest `max_players` a session may be created with.
    pub max_max_players: usize,

    /// `max_players` used when the creator does not pick one.
    pub default_max_players: usize,

    /// Most dice one roll may throw.
    pub max_dice_count: u32,

    /// Largest absolute modifier a roll may carry.
    pub max_modifier: i32,

    /// Difficulty applied to d20 skill checks rolled without a threshold.
    pub default_difficulty: i64,

    /// Post a system message to the log for every roll.
    pub announce_rolls: bool,

    /// Seeds every session's dice. `None` seeds from the OS.
    pub dice_seed: Option<u64>,

    /// Bounded command channel size of each session actor.
    pub command_buffer: usize,

    /// Longest message content, in characters.
    pub max_message_len: usize,

    /// Largest page any listing may return.
    pub max_page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_max_players: 1,
            max_max_players: 10,
            default_max_players: 4,
            max_dice_count: 10,
            max_modifier: 20,
            default_difficulty: 10,
            announce_rolls: true,
            dice_seed: None,
            command_buffer: 64,
            max_message_len: 4000,
            max_page_size: 100,
        }
    }
}

impl TableConfig {
    /// Checks a requested `max_players` against the configured bounds.
    pub fn check_max_players(&self, max_players: usize) -> Result<(), ProtocolError> {
        ProtocolError::check_range(
            "max_players",
            max_players as i64,
            self.min_max_players as i64,
            self.max_max_players as i64,
        )
    }

    /// Returns an error if the configuration cannot be used.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.min_max_players == 0 || self.min_max_players > self.max_max_players {
            return Err(ProtocolError::InvalidValue {
                field: "min_max_players",
                value: self.min_max_players.to_string(),
            });
        }
        ProtocolError::check_range(
            "max_max_players",
            self.max_max_players as i64,
            1,
            PLAYER_LIMIT as i64,
        )?;
        self.check_max_players(self.default_max_players)?;
        ProtocolError::check_range(
            "max_dice_count",
            i64::from(self.max_dice_count),
            1,
            i64::from(DICE_COUNT_LIMIT),
        )?;
        if self.max_modifier < 0 {
            return Err(ProtocolError::InvalidValue {
                field: "max_modifier",
                value: self.max_modifier.to_string(),
            });
        }
        if self.command_buffer == 0 {
            return Err(ProtocolError::InvalidValue {
                field: "command_buffer",
                value: "0".into(),
            });
        }
        if self.max_page_size == 0 {
            return Err(ProtocolError::InvalidValue {
                field: "max_page_size",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_config_default() {
        let config = TableConfig::default();
        assert_eq!(config.min_max_players, 1);
        assert_eq!(config.max_max_players, 10);
        assert_eq!(config.max_dice_count, 10);
        assert_eq!(config.max_modifier, 20);
        assert!(config.announce_rolls);
        assert!(config.dice_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_max_players_bounds() {
        let config = TableConfig::default();
        assert!(config.check_max_players(1).is_ok());
        assert!(config.check_max_players(10).is_ok());
        assert!(config.check_max_players(0).is_err());
        assert!(config.check_max_players(11).is_err());
    }

    #[test]
    fn test_table_config_partial_json_uses_defaults() {
        let config: TableConfig =
            serde_json::from_str(r#"{"dice_seed": 42, "announce_rolls": false}"#).unwrap();
        assert_eq!(config.dice_seed, Some(42));
        assert!(!config.announce_rolls);
        assert_eq!(config.command_buffer, 64);
    }

    #[test]
    fn test_validate_rejects_inverted_player_bounds() {
        let config = TableConfig {
            min_max_players: 5,
            max_max_players: 2,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = TableConfig {
            command_buffer: 0,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_player_limit_above_ten() {
        let config = TableConfig {
            max_max_players: 50,
            ..TableConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ProtocolError::OutOfRange { field: "max_max_players", .. })
        ));

        let at_limit = TableConfig {
            max_max_players: PLAYER_LIMIT,
            ..TableConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unbounded_dice_count() {
        for bad in [0, DICE_COUNT_LIMIT + 1, u32::MAX] {
            let config = TableConfig {
                max_dice_count: bad,
                ..TableConfig::default()
            };
            assert!(
                matches!(
                    config.validate(),
                    Err(ProtocolError::OutOfRange { field: "max_dice_count", .. })
                ),
                "{bad}"
            );
        }
        let at_limit = TableConfig {
            max_dice_count: DICE_COUNT_LIMIT,
            ..TableConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }
}
