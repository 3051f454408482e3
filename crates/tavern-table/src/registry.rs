//! Session registry: creates, tracks, and routes requests to sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures_util::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tavern_policy::{AuthorizationPolicy, Operation, Resource, SessionFacts};
use tavern_protocol::{
    DiceRoll, GameState, IdentityId, Message, MessageId, MessageRole, Participant,
    ParticipantRole, Session, SessionId, SessionStatus,
};
use tokio::sync::RwLock;

use crate::table::{SessionHandle, spawn_session};
use crate::{
    ExportFormat, GameStatePatch, MessageDirectory, MessageFilter, Page, PageRequest, RollRequest,
    SessionFilter, SessionPatch, SessionStats, TableConfig, TableError,
};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// What a creator asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSession {
    /// Defaults to `"Game Session <first 8 token chars>"`.
    pub title: Option<String>,
    pub description: Option<String>,
    /// Defaults to [`TableConfig::default_max_players`].
    pub max_players: Option<usize>,
}

impl NewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn max_players(mut self, max_players: usize) -> Self {
        self.max_players = Some(max_players);
        self
    }
}

#[derive(Default)]
struct SessionIndex {
    sessions: HashMap<SessionId, SessionHandle>,
    tokens: HashMap<String, SessionId>,
}

/// Owns every live session and routes requests to its actor.
///
/// The index lock is held only to look up or insert a handle, never while
/// waiting on an actor. Sessions never block each other.
///
/// A request naming a session that does not exist fails with
/// [`TableError::Forbidden`], the same error an outsider gets for a
/// session that does exist.
pub struct SessionRegistry {
    index: Arc<RwLock<SessionIndex>>,
    directory: MessageDirectory,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<TableConfig>,
}

impl SessionRegistry {
    pub fn new(config: TableConfig, policy: AuthorizationPolicy) -> Self {
        Self {
            index: Arc::new(RwLock::new(SessionIndex::default())),
            directory: MessageDirectory::new(),
            policy: Arc::new(policy),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Clones the handle out of the index.
    async fn handle(&self, session_id: SessionId) -> Result<SessionHandle, TableError> {
        self.index
            .read()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| {
                tracing::debug!(%session_id, "request for unknown session");
                TableError::Forbidden
            })
    }

    // =====================================================================
    // Sessions
    // =====================================================================

    /// Creates a session owned by `creator`. The creator is not a
    /// participant row and does not count against `max_players`.
    pub async fn create_session(
        &self,
        creator: IdentityId,
        request: NewSession,
    ) -> Result<Session, TableError> {
        let max_players = request.max_players.unwrap_or(self.config.default_max_players);
        self.config.check_max_players(max_players)?;

        let session_id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let facts = SessionFacts::new(session_id, creator);
        self.policy
            .require(creator, Some(&facts), Operation::Create, &Resource::Session)?;

        let mut index = self.index.write().await;
        let token = loop {
            let token = generate_token();
            if !index.tokens.contains_key(&token) {
                break token;
            }
        };

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Game Session {}", &token[..8]));
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned);

        let now = Utc::now();
        let session = Session {
            id: session_id,
            token: token.clone(),
            title,
            description,
            status: SessionStatus::Active,
            max_players,
            creator,
            created_at: now,
            updated_at: now,
        };

        let handle = spawn_session(
            session.clone(),
            Arc::clone(&self.policy),
            Arc::clone(&self.config),
            self.directory.clone(),
        );
        index.sessions.insert(session_id, handle);
        index.tokens.insert(token, session_id);
        drop(index);

        tracing::info!(%session_id, %creator, max_players, "session created");
        Ok(session)
    }

    pub async fn get_session(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<Session, TableError> {
        self.handle(session_id).await?.get(caller).await
    }

    /// Looks a session up by its public token.
    pub async fn get_session_by_token(
        &self,
        caller: IdentityId,
        token: &str,
    ) -> Result<Session, TableError> {
        let session_id = self.index.read().await.tokens.get(token).copied();
        let Some(session_id) = session_id else {
            tracing::debug!(%caller, "request for unknown session token");
            return Err(TableError::Forbidden);
        };
        self.get_session(caller, session_id).await
    }

    /// Sessions `caller` created or joined, filtered and paginated.
    ///
    /// Asks every session actor at once. An actor that cannot answer fails
    /// the whole listing with [`TableError::Unavailable`].
    pub async fn list_sessions(
        &self,
        caller: IdentityId,
        filter: SessionFilter,
    ) -> Result<Page<Session>, TableError> {
        filter.window().validate(self.config.max_page_size)?;

        let handles: Vec<SessionHandle> =
            self.index.read().await.sessions.values().cloned().collect();
        let answers = join_all(handles.iter().map(|handle| handle.describe(caller))).await;

        let mut visible = Vec::new();
        for answer in answers {
            match answer {
                Ok(Some(session)) => visible.push(session),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%caller, error = %e, "session listing failed");
                    return Err(e);
                }
            }
        }
        Ok(filter.apply(visible))
    }

    pub async fn update_session(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        patch: SessionPatch,
    ) -> Result<Session, TableError> {
        self.handle(session_id).await?.update(caller, patch).await
    }

    /// Moves the session to `status`. Completing it posts a closing notice.
    pub async fn update_status(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<Session, TableError> {
        self.handle(session_id)
            .await?
            .set_status(caller, status)
            .await
    }

    /// Deletes the session with all its participants, messages, game
    /// state and dice rolls.
    ///
    /// The actor delete and the index cleanup run in their own task, so
    /// dropping the returned future never leaves a deleted session in the
    /// index.
    pub async fn delete_session(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<(), TableError> {
        let handle = self.handle(session_id).await?;
        let index = Arc::clone(&self.index);
        let directory = self.directory.clone();

        let task = tokio::spawn(async move {
            handle.delete(caller).await?;

            let mut index = index.write().await;
            index.sessions.remove(&session_id);
            index.tokens.retain(|_, sid| *sid != session_id);
            drop(index);
            directory.forget_session(session_id);

            tracing::info!(%session_id, %caller, "session removed from registry");
            Ok::<(), TableError>(())
        });
        task.await
            .map_err(|_| TableError::Unavailable(session_id))?
    }

    pub async fn session_stats(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<SessionStats, TableError> {
        self.handle(session_id).await?.stats(caller).await
    }

    // =====================================================================
    // Participants
    // =====================================================================

    /// Joins `caller` to the session as a player.
    pub async fn join(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<Participant, TableError> {
        self.handle(session_id).await?.join(caller).await
    }

    /// Removes `caller` from the session. Returns `Ok(false)` if it was
    /// not a participant, including when the session does not exist.
    pub async fn leave(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<bool, TableError> {
        match self.handle(session_id).await {
            Ok(handle) => handle.remove_participant(caller, caller).await,
            Err(TableError::Forbidden) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes `target` from the session. Returns `Ok(false)` if it was
    /// not a participant.
    pub async fn remove_participant(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        target: IdentityId,
    ) -> Result<bool, TableError> {
        self.handle(session_id)
            .await?
            .remove_participant(caller, target)
            .await
    }

    pub async fn set_participant_role(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        target: IdentityId,
        role: ParticipantRole,
    ) -> Result<Participant, TableError> {
        self.handle(session_id)
            .await?
            .set_role(caller, target, role)
            .await
    }

    /// Participants in join order. The creator is not listed.
    pub async fn list_participants(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, TableError> {
        self.handle(session_id)
            .await?
            .list_participants(caller)
            .await
    }

    // =====================================================================
    // Message log
    // =====================================================================

    pub async fn append_message(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        content: impl Into<String>,
        role: MessageRole,
    ) -> Result<Message, TableError> {
        self.handle(session_id)
            .await?
            .append_message(caller, content.into(), role)
            .await
    }

    /// Resolves the message's session, then reads it.
    pub async fn get_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        let session_id = self.resolve_message(caller, message_id)?;
        self.handle(session_id)
            .await?
            .get_message(caller, message_id)
            .await
    }

    /// Deletes a message. Allowed for its author and the session creator.
    pub async fn delete_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        let session_id = self.resolve_message(caller, message_id)?;
        self.handle(session_id)
            .await?
            .delete_message(caller, message_id)
            .await
    }

    /// An unknown message id looks like a message in someone else's
    /// session.
    fn resolve_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<SessionId, TableError> {
        self.directory.lookup(message_id).ok_or_else(|| {
            tracing::debug!(%caller, %message_id, "request for unknown message");
            TableError::Forbidden
        })
    }

    /// Deletes every message of the session. Creator only. Returns how
    /// many were removed.
    pub async fn clear_messages(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<usize, TableError> {
        self.handle(session_id).await?.clear_messages(caller).await
    }

    /// Renders the whole log in `format`.
    pub async fn export_messages(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        format: ExportFormat,
    ) -> Result<String, TableError> {
        self.handle(session_id)
            .await?
            .export_messages(caller, format)
            .await
    }

    /// Messages in creation order.
    pub async fn list_messages(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        filter: MessageFilter,
    ) -> Result<Page<Message>, TableError> {
        self.handle(session_id)
            .await?
            .list_messages(caller, filter)
            .await
    }

    // =====================================================================
    // Game state
    // =====================================================================

    pub async fn read_game_state(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<GameState, TableError> {
        self.handle(session_id)
            .await?
            .read_game_state(caller)
            .await
    }

    /// Creates or merges into the session's game state.
    pub async fn upsert_game_state(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        patch: GameStatePatch,
    ) -> Result<GameState, TableError> {
        self.handle(session_id)
            .await?
            .upsert_game_state(caller, patch)
            .await
    }

    /// Deletes the game state. Returns `Ok(false)` if there was none.
    pub async fn clear_game_state(
        &self,
        caller: IdentityId,
        session_id: SessionId,
    ) -> Result<bool, TableError> {
        self.handle(session_id)
            .await?
            .clear_game_state(caller)
            .await
    }

    // =====================================================================
    // Dice
    // =====================================================================

    pub async fn roll(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        request: RollRequest,
    ) -> Result<DiceRoll, TableError> {
        self.handle(session_id).await?.roll(caller, request).await
    }

    /// Rolls newest first.
    pub async fn list_rolls(
        &self,
        caller: IdentityId,
        session_id: SessionId,
        window: PageRequest,
    ) -> Result<Page<DiceRoll>, TableError> {
        self.handle(session_id)
            .await?
            .list_rolls(caller, window)
            .await
    }

    // =====================================================================
    // Introspection
    // =====================================================================

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.index.read().await.sessions.len()
    }

    /// Number of messages across all sessions.
    pub fn message_count(&self) -> usize {
        self.directory.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(TableConfig::default(), AuthorizationPolicy::default())
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
