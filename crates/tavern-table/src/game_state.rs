//! Game state patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tavern_protocol::{GameState, SessionId, Variables};

use crate::TableError;

/// A write to a session's game state document.
///
/// `variables` is merged one level deep: listed keys are inserted or
/// overwritten, unlisted keys are kept, nested objects are replaced whole.
/// `current_scene` and `last_action` are overwritten only when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStatePatch {
    pub current_scene: Option<String>,
    pub variables: Variables,
    pub last_action: Option<String>,
    /// The version the writer last read. `0` means "no document yet".
    /// `None` skips the check.
    pub expected_version: Option<u64>,
}

impl GameStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(mut self, scene: impl Into<String>) -> Self {
        self.current_scene = Some(scene.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.last_action = Some(action.into());
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Applies the patch to the current document, or creates one.
    ///
    /// `last_issued` is the highest version this session ever issued. It
    /// survives a cleared document, so a recreated document continues the
    /// sequence and a writer still holding a pre-clear version conflicts.
    /// The result's version is one above both. Fails with `Conflict` if
    /// `expected_version` is set and does not match the current document
    /// (`0` when there is none).
    pub fn apply(
        self,
        session_id: SessionId,
        current: Option<&GameState>,
        last_issued: u64,
        now: DateTime<Utc>,
    ) -> Result<GameState, TableError> {
        let actual = current.map_or(0, |state| state.version);
        if let Some(expected) = self.expected_version {
            if expected != actual {
                return Err(TableError::Conflict {
                    session_id,
                    expected,
                    actual,
                });
            }
        }

        let mut next = match current {
            Some(state) => state.clone(),
            None => GameState {
                session_id,
                current_scene: None,
                variables: Variables::new(),
                last_action: None,
                version: 0,
                updated_at: now,
            },
        };
        if let Some(scene) = self.current_scene {
            next.current_scene = Some(scene);
        }
        if let Some(action) = self.last_action {
            next.last_action = Some(action);
        }
        next.variables.extend(self.variables);
        next.version = actual.max(last_issued) + 1;
        next.updated_at = now;
        Ok(next)
    }
}
