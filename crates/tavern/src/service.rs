//! `Tavern` builder and service.
//!
//! This is the entry point for embedding Tavern. It ties the layers
//! together: identity verification → profile provisioning → policy →
//! session tables.

use std::fmt;

use tavern_identity::{IdentityProvider, ProfilePatch, ProfileProvisioner, ProvisionerConfig};
use tavern_policy::{AuthorizationPolicy, Operation, PolicyConfig, Resource};
use tavern_protocol::{
    DiceRoll, GameState, IdentityId, Message, MessageId, MessageRole, Participant,
    ParticipantRole, Profile, Session, SessionId, SessionStatus,
};
use tavern_table::{
    ExportFormat, GameStatePatch, MessageFilter, NewSession, Page, PageRequest, RollRequest, SessionFilter,
    SessionPatch, SessionRegistry, SessionStats, TableConfig,
};
use tokio::sync::RwLock;

use crate::{TavernConfig, TavernError};

/// A verified, provisioned caller.
///
/// Only [`Tavern::authenticate`] hands these out, so holding one proves the
/// identity provider accepted the credential and the caller has a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    identity: IdentityId,
}

impl Caller {
    pub fn identity(&self) -> IdentityId {
        self.identity
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.identity, f)
    }
}

// ---------------------------------------------------------------------------
// TavernBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`Tavern`].
///
/// # Example
///
/// ```rust,ignore
/// use tavern::prelude::*;
///
/// let tavern = Tavern::builder()
///     .table(TableConfig { dice_seed: Some(7), ..TableConfig::default() })
///     .build(my_provider)?;
/// let caller = tavern.authenticate("token").await?;
/// ```
pub struct TavernBuilder {
    config: TavernConfig,
}

impl TavernBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: TavernConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: TavernConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the session limits.
    pub fn table(mut self, config: TableConfig) -> Self {
        self.config.table = config;
        self
    }

    /// Sets the authorization policy options.
    pub fn policy(mut self, config: PolicyConfig) -> Self {
        self.config.policy = config;
        self
    }

    /// Sets the profile provisioning rules.
    pub fn profiles(mut self, config: ProvisionerConfig) -> Self {
        self.config.profiles = config;
        self
    }

    /// Validates the configuration and builds the service around
    /// `provider`. Must be called inside a Tokio runtime: sessions spawn
    /// actor tasks.
    pub fn build<P: IdentityProvider>(self, provider: P) -> Result<Tavern<P>, TavernError> {
        self.config.validate()?;
        let TavernConfig {
            table,
            policy,
            profiles,
        } = self.config;

        tracing::info!(
            max_players = table.max_max_players,
            announce_rolls = table.announce_rolls,
            gm_writes_game_state = policy.delegate_game_state_to_gm,
            "tavern ready"
        );

        Ok(Tavern {
            provider,
            profiles: RwLock::new(ProfileProvisioner::new(profiles)),
            sessions: SessionRegistry::new(table, AuthorizationPolicy::new(policy)),
        })
    }
}

impl Default for TavernBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tavern
// ---------------------------------------------------------------------------

/// The service: every operation takes a [`Caller`] and is authorized
/// before it runs.
///
/// Share it across tasks with `Arc<Tavern<P>>`; every method takes `&self`.
pub struct Tavern<P: IdentityProvider> {
    provider: P,
    profiles: RwLock<ProfileProvisioner>,
    sessions: SessionRegistry,
}

impl<P: IdentityProvider> Tavern<P> {
    /// Creates a new builder.
    pub fn builder() -> TavernBuilder {
        TavernBuilder::new()
    }

    /// The session registry, for callers that manage identities
    /// themselves.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn policy(&self) -> &AuthorizationPolicy {
        self.sessions.policy()
    }

    // =====================================================================
    // Identity and profiles
    // =====================================================================

    /// Verifies `credential` and makes sure the caller has a profile.
    pub async fn authenticate(&self, credential: &str) -> Result<Caller, TavernError> {
        let verified = self.provider.verify(credential).await.map_err(|e| {
            tracing::debug!(error = %e, "credential rejected");
            e
        })?;
        let known = self.profiles.read().await.get(&verified.id).is_some();
        if !known {
            self.profiles.write().await.ensure(&verified)?;
        }
        Ok(Caller {
            identity: verified.id,
        })
    }

    /// The caller's own profile.
    pub async fn my_profile(&self, caller: &Caller) -> Result<Profile, TavernError> {
        self.get_profile(caller, caller.identity).await
    }

    /// Any identity's profile. Profiles are public.
    pub async fn get_profile(
        &self,
        caller: &Caller,
        identity: IdentityId,
    ) -> Result<Profile, TavernError> {
        self.policy().require(
            caller.identity,
            None,
            Operation::Read,
            &Resource::Profile { owner: identity },
        )?;
        Ok(self.profiles.read().await.profile(identity)?.clone())
    }

    /// Finds a profile by username (case-insensitive). `Ok(None)` if no
    /// profile holds it.
    pub async fn find_profile(
        &self,
        caller: &Caller,
        username: &str,
    ) -> Result<Option<Profile>, TavernError> {
        let profiles = self.profiles.read().await;
        let Some(profile) = profiles.find_by_username(username) else {
            return Ok(None);
        };
        self.policy().require(
            caller.identity,
            None,
            Operation::Read,
            &Resource::Profile { owner: profile.id },
        )?;
        Ok(Some(profile.clone()))
    }

    /// Edits `target`'s profile. Only the owner may.
    pub async fn update_profile(
        &self,
        caller: &Caller,
        target: IdentityId,
        patch: ProfilePatch,
    ) -> Result<Profile, TavernError> {
        self.policy().require(
            caller.identity,
            None,
            Operation::Update,
            &Resource::Profile { owner: target },
        )?;
        let mut profiles = self.profiles.write().await;
        Ok(profiles.update(caller.identity, target, patch)?.clone())
    }

    // =====================================================================
    // Sessions
    // =====================================================================

    pub async fn create_session(
        &self,
        caller: &Caller,
        request: NewSession,
    ) -> Result<Session, TavernError> {
        Ok(self.sessions.create_session(caller.identity, request).await?)
    }

    pub async fn get_session(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<Session, TavernError> {
        Ok(self.sessions.get_session(caller.identity, session_id).await?)
    }

    pub async fn get_session_by_token(
        &self,
        caller: &Caller,
        token: &str,
    ) -> Result<Session, TavernError> {
        Ok(self
            .sessions
            .get_session_by_token(caller.identity, token)
            .await?)
    }

    /// Sessions the caller created or joined, newest first.
    pub async fn list_sessions(
        &self,
        caller: &Caller,
        filter: SessionFilter,
    ) -> Result<Page<Session>, TavernError> {
        Ok(self.sessions.list_sessions(caller.identity, filter).await?)
    }

    pub async fn update_session(
        &self,
        caller: &Caller,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<Session, TavernError> {
        Ok(self
            .sessions
            .update_session(caller.identity, session_id, patch)
            .await?)
    }

    pub async fn update_status(
        &self,
        caller: &Caller,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<Session, TavernError> {
        Ok(self
            .sessions
            .update_status(caller.identity, session_id, status)
            .await?)
    }

    pub async fn delete_session(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<(), TavernError> {
        Ok(self.sessions.delete_session(caller.identity, session_id).await?)
    }

    pub async fn session_stats(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<SessionStats, TavernError> {
        Ok(self.sessions.session_stats(caller.identity, session_id).await?)
    }

    // =====================================================================
    // Participants
    // =====================================================================

    pub async fn join(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<Participant, TavernError> {
        Ok(self.sessions.join(caller.identity, session_id).await?)
    }

    /// Returns `Ok(false)` if the caller was not a participant.
    pub async fn leave(&self, caller: &Caller, session_id: SessionId) -> Result<bool, TavernError> {
        Ok(self.sessions.leave(caller.identity, session_id).await?)
    }

    /// Returns `Ok(false)` if `target` was not a participant.
    pub async fn remove_participant(
        &self,
        caller: &Caller,
        session_id: SessionId,
        target: IdentityId,
    ) -> Result<bool, TavernError> {
        Ok(self
            .sessions
            .remove_participant(caller.identity, session_id, target)
            .await?)
    }

    pub async fn set_participant_role(
        &self,
        caller: &Caller,
        session_id: SessionId,
        target: IdentityId,
        role: ParticipantRole,
    ) -> Result<Participant, TavernError> {
        Ok(self
            .sessions
            .set_participant_role(caller.identity, session_id, target, role)
            .await?)
    }

    pub async fn list_participants(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, TavernError> {
        Ok(self
            .sessions
            .list_participants(caller.identity, session_id)
            .await?)
    }

    // =====================================================================
    // Message log
    // =====================================================================

    pub async fn post_message(
        &self,
        caller: &Caller,
        session_id: SessionId,
        content: impl Into<String>,
        role: MessageRole,
    ) -> Result<Message, TavernError> {
        Ok(self
            .sessions
            .append_message(caller.identity, session_id, content, role)
            .await?)
    }

    pub async fn get_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> Result<Message, TavernError> {
        Ok(self.sessions.get_message(caller.identity, message_id).await?)
    }

    pub async fn delete_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> Result<Message, TavernError> {
        Ok(self
            .sessions
            .delete_message(caller.identity, message_id)
            .await?)
    }

    pub async fn list_messages(
        &self,
        caller: &Caller,
        session_id: SessionId,
        filter: MessageFilter,
    ) -> Result<Page<Message>, TavernError> {
        Ok(self
            .sessions
            .list_messages(caller.identity, session_id, filter)
            .await?)
    }

    /// Empties the message log. Creator only; returns how many were removed.
    pub async fn clear_messages(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<usize, TavernError> {
        Ok(self
            .sessions
            .clear_messages(caller.identity, session_id)
            .await?)
    }

    pub async fn export_messages(
        &self,
        caller: &Caller,
        session_id: SessionId,
        format: ExportFormat,
    ) -> Result<String, TavernError> {
        Ok(self
            .sessions
            .export_messages(caller.identity, session_id, format)
            .await?)
    }

    // =====================================================================
    // Game state
    // =====================================================================

    pub async fn game_state(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<GameState, TavernError> {
        Ok(self
            .sessions
            .read_game_state(caller.identity, session_id)
            .await?)
    }

    pub async fn update_game_state(
        &self,
        caller: &Caller,
        session_id: SessionId,
        patch: GameStatePatch,
    ) -> Result<GameState, TavernError> {
        Ok(self
            .sessions
            .upsert_game_state(caller.identity, session_id, patch)
            .await?)
    }

    pub async fn clear_game_state(
        &self,
        caller: &Caller,
        session_id: SessionId,
    ) -> Result<bool, TavernError> {
        Ok(self
            .sessions
            .clear_game_state(caller.identity, session_id)
            .await?)
    }

    // =====================================================================
    // Dice
    // =====================================================================

    pub async fn roll(
        &self,
        caller: &Caller,
        session_id: SessionId,
        request: RollRequest,
    ) -> Result<DiceRoll, TavernError> {
        Ok(self.sessions.roll(caller.identity, session_id, request).await?)
    }

    pub async fn list_rolls(
        &self,
        caller: &Caller,
        session_id: SessionId,
        window: PageRequest,
    ) -> Result<Page<DiceRoll>, TavernError> {
        Ok(self
            .sessions
            .list_rolls(caller.identity, session_id, window)
            .await?)
    }
}
