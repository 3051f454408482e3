//! The decision function.

use std::fmt;

use serde::{Deserialize, Serialize};
use tavern_protocol::{IdentityId, ParticipantRole};

use crate::MembershipFacts;

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// Tunable parts of the policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// When `true`, participants with role `gm` may write the game state
    /// in addition to the session creator. Off by default: only the
    /// creator writes.
    pub delegate_game_state_to_gm: bool,
}

// ---------------------------------------------------------------------------
// Operation / Resource
// ---------------------------------------------------------------------------

/// What the caller wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// What the caller wants to do it to.
///
/// Variants carry the row attributes the rules depend on (the owner of a
/// profile, the author of a message, the identity of a participant row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Profile { owner: IdentityId },
    Session,
    Message { author: Option<IdentityId> },
    Participant { identity: IdentityId },
    GameState,
    DiceRoll,
}

impl Resource {
    /// Short table-like name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Profile { .. } => "profile",
            Self::Session => "session",
            Self::Message { .. } => "message",
            Self::Participant { .. } => "participant",
            Self::GameState => "game_state",
            Self::DiceRoll => "dice_roll",
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The policy's answer. A denial carries no reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts the decision into a `Result` for use with `?`.
    pub fn into_result(self) -> Result<(), Denied> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(Denied),
        }
    }
}

/// A policy denial. Identical for every denied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("forbidden")]
pub struct Denied;

// ---------------------------------------------------------------------------
// AuthorizationPolicy
// ---------------------------------------------------------------------------

/// Decides whether a caller may perform an operation on a resource.
///
/// Rules, by resource (accessible = creator or participant):
///
/// | resource    | read       | create            | update          | delete                   |
/// |-------------|------------|-------------------|-----------------|--------------------------|
/// | profile     | anyone     | owner             | owner           | nobody                   |
/// | session     | accessible | caller is creator | creator         | creator                  |
/// | message     | accessible | accessible        | nobody          | author or creator        |
/// | participant | accessible | caller is joiner  | creator         | the participant or creator |
/// | game state  | accessible | writer            | writer          | writer                   |
/// | dice roll   | accessible | accessible        | nobody          | nobody                   |
///
/// "writer" is the creator, plus `gm` participants when
/// [`PolicyConfig::delegate_game_state_to_gm`] is set.
///
/// Session-scoped resources require facts. Passing `None` (the session
/// does not exist) always yields [`Decision::Deny`], so an outsider cannot
/// tell a missing session from a private one.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    config: PolicyConfig,
}

impl AuthorizationPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The decision function.
    pub fn can_access(
        &self,
        caller: IdentityId,
        facts: Option<&dyn MembershipFacts>,
        op: Operation,
        resource: &Resource,
    ) -> Decision {
        use Operation::*;

        if let Resource::Profile { owner } = resource {
            return Decision::from_bool(match op {
                Read => true,
                Create | Update => caller == *owner,
                Delete => false,
            });
        }

        let Some(facts) = facts else {
            return Decision::Deny;
        };
        let is_creator = facts.is_creator(caller);
        let accessible = facts.is_accessible_to(caller);

        let allowed = match (resource, op) {
            // Answered above, without facts.
            (Resource::Profile { .. }, _) => false,

            (Resource::Session, Read) => accessible,
            (Resource::Session, Create | Update | Delete) => is_creator,

            (Resource::Message { .. }, Read | Create) => accessible,
            (Resource::Message { .. }, Update) => false,
            (Resource::Message { author }, Delete) => {
                is_creator || *author == Some(caller)
            }

            (Resource::Participant { .. }, Read) => accessible,
            (Resource::Participant { identity }, Create) => caller == *identity,
            (Resource::Participant { .. }, Update) => is_creator,
            (Resource::Participant { identity }, Delete) => {
                is_creator || caller == *identity
            }

            (Resource::GameState, Read) => accessible,
            (Resource::GameState, Create | Update | Delete) => {
                self.may_write_game_state(caller, facts)
            }

            (Resource::DiceRoll, Read | Create) => accessible,
            (Resource::DiceRoll, Update | Delete) => false,
        };

        Decision::from_bool(allowed)
    }

    /// Shorthand for `can_access(..).into_result()`.
    pub fn require(
        &self,
        caller: IdentityId,
        facts: Option<&dyn MembershipFacts>,
        op: Operation,
        resource: &Resource,
    ) -> Result<(), Denied> {
        self.can_access(caller, facts, op, resource).into_result()
    }

    fn may_write_game_state(
        &self,
        caller: IdentityId,
        facts: &dyn MembershipFacts,
    ) -> bool {
        if facts.is_creator(caller) {
            return true;
        }
        self.config.delegate_game_state_to_gm
            && facts.participant_role(caller) == Some(ParticipantRole::Gm)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use tavern_protocol::SessionId;

    use super::*;
    use crate::SessionFacts;

    const CREATOR: IdentityId = IdentityId(1);
    const PLAYER: IdentityId = IdentityId(2);
    const GM: IdentityId = IdentityId(3);
    const OUTSIDER: IdentityId = IdentityId(4);

    fn facts() -> SessionFacts {
        SessionFacts::new(SessionId(10), CREATOR)
            .with_participant(PLAYER, ParticipantRole::Player)
            .with_participant(GM, ParticipantRole::Gm)
    }

    fn allowed(
        policy: &AuthorizationPolicy,
        caller: IdentityId,
        op: Operation,
        resource: Resource,
    ) -> bool {
        let facts = facts();
        policy
            .can_access(caller, Some(&facts), op, &resource)
            .is_allowed()
    }

    fn default_policy() -> AuthorizationPolicy {
        AuthorizationPolicy::default()
    }

    // =====================================================================
    // Profile
    // =====================================================================

    #[test]
    fn test_profile_read_is_public() {
        let p = default_policy();
        let decision = p.can_access(
            OUTSIDER,
            None,
            Operation::Read,
            &Resource::Profile { owner: CREATOR },
        );
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_profile_write_only_by_owner() {
        let p = default_policy();
        let own = Resource::Profile { owner: PLAYER };
        assert!(p.can_access(PLAYER, None, Operation::Update, &own).is_allowed());
        assert!(p.can_access(PLAYER, None, Operation::Create, &own).is_allowed());
        assert!(!p.can_access(CREATOR, None, Operation::Update, &own).is_allowed());
        assert!(!p.can_access(PLAYER, None, Operation::Delete, &own).is_allowed());
    }

    // =====================================================================
    // Session
    // =====================================================================

    #[test]
    fn test_session_read_requires_accessibility() {
        let p = default_policy();
        assert!(allowed(&p, CREATOR, Operation::Read, Resource::Session));
        assert!(allowed(&p, PLAYER, Operation::Read, Resource::Session));
        assert!(!allowed(&p, OUTSIDER, Operation::Read, Resource::Session));
    }

    #[test]
    fn test_session_mutations_creator_only() {
        let p = default_policy();
        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            assert!(allowed(&p, CREATOR, op, Resource::Session));
            assert!(!allowed(&p, GM, op, Resource::Session), "{op}");
            assert!(!allowed(&p, PLAYER, op, Resource::Session), "{op}");
        }
    }

    #[test]
    fn test_missing_session_denies_everyone() {
        // No facts means the session does not exist. Even a would-be
        // creator gets the same answer as an outsider.
        let p = default_policy();
        for caller in [CREATOR, OUTSIDER] {
            for resource in [Resource::Session, Resource::GameState, Resource::DiceRoll] {
                let d = p.can_access(caller, None, Operation::Read, &resource);
                assert_eq!(d, Decision::Deny);
            }
        }
    }

    // =====================================================================
    // Message
    // =====================================================================

    #[test]
    fn test_message_read_and_create_require_accessibility() {
        let p = default_policy();
        let msg = Resource::Message { author: None };
        assert!(allowed(&p, PLAYER, Operation::Read, msg));
        assert!(allowed(&p, PLAYER, Operation::Create, msg));
        assert!(!allowed(&p, OUTSIDER, Operation::Read, msg));
        assert!(!allowed(&p, OUTSIDER, Operation::Create, msg));
    }

    #[test]
    fn test_message_delete_by_author_or_creator() {
        let p = default_policy();
        let players_msg = Resource::Message { author: Some(PLAYER) };
        assert!(allowed(&p, PLAYER, Operation::Delete, players_msg));
        assert!(allowed(&p, CREATOR, Operation::Delete, players_msg));
        assert!(!allowed(&p, GM, Operation::Delete, players_msg));

        let system_msg = Resource::Message { author: None };
        assert!(allowed(&p, CREATOR, Operation::Delete, system_msg));
        assert!(!allowed(&p, PLAYER, Operation::Delete, system_msg));
    }

    #[test]
    fn test_message_update_always_denied() {
        let p = default_policy();
        let msg = Resource::Message { author: Some(CREATOR) };
        assert!(!allowed(&p, CREATOR, Operation::Update, msg));
    }

    // =====================================================================
    // Participant
    // =====================================================================

    #[test]
    fn test_participant_join_is_self_service() {
        let p = default_policy();
        let joining = Resource::Participant { identity: OUTSIDER };
        assert!(allowed(&p, OUTSIDER, Operation::Create, joining));
        // Nobody, not even the creator, can join someone else in.
        assert!(!allowed(&p, CREATOR, Operation::Create, joining));
    }

    #[test]
    fn test_participant_delete_by_self_or_creator() {
        let p = default_policy();
        let row = Resource::Participant { identity: PLAYER };
        assert!(allowed(&p, PLAYER, Operation::Delete, row));
        assert!(allowed(&p, CREATOR, Operation::Delete, row));
        assert!(!allowed(&p, GM, Operation::Delete, row));
    }

    #[test]
    fn test_participant_role_change_creator_only() {
        let p = default_policy();
        let row = Resource::Participant { identity: PLAYER };
        assert!(allowed(&p, CREATOR, Operation::Update, row));
        assert!(!allowed(&p, PLAYER, Operation::Update, row));
    }

    #[test]
    fn test_participant_read_requires_accessibility() {
        let p = default_policy();
        let row = Resource::Participant { identity: PLAYER };
        assert!(allowed(&p, GM, Operation::Read, row));
        assert!(!allowed(&p, OUTSIDER, Operation::Read, row));
    }

    // =====================================================================
    // GameState
    // =====================================================================

    #[test]
    fn test_game_state_write_creator_only_by_default() {
        let p = default_policy();
        assert!(allowed(&p, CREATOR, Operation::Update, Resource::GameState));
        assert!(!allowed(&p, GM, Operation::Update, Resource::GameState));
        assert!(!allowed(&p, PLAYER, Operation::Update, Resource::GameState));
        assert!(allowed(&p, PLAYER, Operation::Read, Resource::GameState));
    }

    #[test]
    fn test_game_state_write_delegated_to_gm_when_enabled() {
        let p = AuthorizationPolicy::new(PolicyConfig {
            delegate_game_state_to_gm: true,
        });
        assert!(allowed(&p, GM, Operation::Update, Resource::GameState));
        assert!(allowed(&p, GM, Operation::Create, Resource::GameState));
        assert!(!allowed(&p, PLAYER, Operation::Update, Resource::GameState));
        assert!(!allowed(&p, OUTSIDER, Operation::Update, Resource::GameState));
    }

    // =====================================================================
    // DiceRoll
    // =====================================================================

    #[test]
    fn test_dice_roll_read_create_accessible_never_mutable() {
        let p = default_policy();
        assert!(allowed(&p, PLAYER, Operation::Create, Resource::DiceRoll));
        assert!(allowed(&p, PLAYER, Operation::Read, Resource::DiceRoll));
        assert!(!allowed(&p, OUTSIDER, Operation::Create, Resource::DiceRoll));
        assert!(!allowed(&p, CREATOR, Operation::Delete, Resource::DiceRoll));
        assert!(!allowed(&p, CREATOR, Operation::Update, Resource::DiceRoll));
    }

    #[test]
    fn test_require_returns_uniform_denial() {
        let p = default_policy();
        let facts = facts();
        let existing = p.require(OUTSIDER, Some(&facts), Operation::Read, &Resource::Session);
        let missing = p.require(OUTSIDER, None, Operation::Read, &Resource::Session);
        assert_eq!(existing, missing);
        assert_eq!(existing.unwrap_err().to_string(), "forbidden");
    }
}
