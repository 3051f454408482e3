//! Umbrella configuration.

use serde::{Deserialize, Serialize};
use tavern_identity::ProvisionerConfig;
use tavern_policy::PolicyConfig;
use tavern_table::TableConfig;

use crate::TavernError;

/// Everything a [`Tavern`](crate::Tavern) can be tuned with.
///
/// Each section defaults independently, so `{}` is a valid document:
///
/// ```rust
/// use tavern::TavernConfig;
///
/// let config = TavernConfig::from_json_str(
///     r#"{ "table": { "dice_seed": 7 }, "policy": { "delegate_game_state_to_gm": true } }"#,
/// ).unwrap();
/// assert_eq!(config.table.dice_seed, Some(7));
/// assert!(config.policy.delegate_game_state_to_gm);
/// assert_eq!(config.profiles.default_display_name, "Adventurer");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TavernConfig {
    pub table: TableConfig,
    pub policy: PolicyConfig,
    pub profiles: ProvisionerConfig,
}

impl TavernConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, TavernError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns an error if any section cannot be used.
    pub fn validate(&self) -> Result<(), TavernError> {
        self.table.validate()?;
        Ok(())
    }
}
