//! Profile configuration and update payloads.

use serde::{Deserialize, Serialize};
use tavern_protocol::ProtocolError;

// ---------------------------------------------------------------------------
// ProvisionerConfig
// ---------------------------------------------------------------------------

/// Settings for profile provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Display name used when the identity supplied neither a name nor a
    /// usable contact address.
    pub default_display_name: String,

    /// Minimum username length, in characters.
    pub min_username_len: usize,

    /// Maximum username length, in characters.
    pub max_username_len: usize,

    /// Maximum display name length, in characters. Longer names are
    /// truncated rather than rejected.
    pub max_display_name_len: usize,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            default_display_name: "Adventurer".to_string(),
            min_username_len: 3,
            max_username_len: 32,
            max_display_name_len: 64,
        }
    }
}

impl ProvisionerConfig {
    /// Normalizes and validates a requested username.
    ///
    /// Usernames are trimmed and lower-cased, so `"Dragon"` and `"dragon"`
    /// collide. Allowed characters: ASCII letters, digits, `_` and `-`.
    pub fn normalize_username(&self, raw: &str) -> Result<String, ProtocolError> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            return Err(ProtocolError::Empty("username"));
        }
        let len = name.chars().count();
        ProtocolError::check_range(
            "username length",
            len as i64,
            self.min_username_len as i64,
            self.max_username_len as i64,
        )?;
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ProtocolError::InvalidValue {
                field: "username",
                value: raw.to_string(),
            });
        }
        Ok(name)
    }

    /// Trims and truncates a display name. Returns `None` if nothing is
    /// left after trimming.
    pub fn clean_display_name(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.chars().take(self.max_display_name_len).collect())
    }
}

// ---------------------------------------------------------------------------
// ProfilePatch
// ---------------------------------------------------------------------------

/// Fields a profile owner may change. `None` leaves a field untouched.
///
/// The account role is not part of the patch: owners cannot promote
/// themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}
