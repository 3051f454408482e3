//! Membership facts the policy decides over.

use std::collections::BTreeMap;

use tavern_protocol::{IdentityId, ParticipantRole, SessionId};

/// Ownership and membership of one session, as seen by the policy.
///
/// Implemented by whatever holds the session's rows. The session actor
/// implements it over its live state; tests use [`SessionFacts`].
pub trait MembershipFacts {
    /// The session these facts describe.
    fn session_id(&self) -> SessionId;

    /// The identity that created the session.
    fn creator(&self) -> IdentityId;

    /// The participant role of `identity`, or `None` if it has not joined.
    /// The creator is never a participant row.
    fn participant_role(&self, identity: IdentityId) -> Option<ParticipantRole>;

    /// Returns `true` if `identity` created the session.
    fn is_creator(&self, identity: IdentityId) -> bool {
        self.creator() == identity
    }

    /// Returns `true` if `identity` has joined the session.
    fn is_participant(&self, identity: IdentityId) -> bool {
        self.participant_role(identity).is_some()
    }

    /// An accessible session is one the identity created or joined.
    fn is_accessible_to(&self, identity: IdentityId) -> bool {
        self.is_creator(identity) || self.is_participant(identity)
    }
}

/// An owned snapshot of a session's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFacts {
    pub session_id: SessionId,
    pub creator: IdentityId,
    pub participants: BTreeMap<IdentityId, ParticipantRole>,
}

impl SessionFacts {
    /// Facts for a session with no participants yet.
    pub fn new(session_id: SessionId, creator: IdentityId) -> Self {
        Self {
            session_id,
            creator,
            participants: BTreeMap::new(),
        }
    }

    /// Adds a participant.
    pub fn with_participant(
        mut self,
        identity: IdentityId,
        role: ParticipantRole,
    ) -> Self {
        self.participants.insert(identity, role);
        self
    }
}

impl MembershipFacts for SessionFacts {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn creator(&self) -> IdentityId {
        self.creator
    }

    fn participant_role(&self, identity: IdentityId) -> Option<ParticipantRole> {
        self.participants.get(&identity).copied()
    }
}
