//! Session actor: an isolated Tokio task that owns one session's rows.
//!
//! The actor holds the session record, its participants, message log,
//! game state and dice rolls, and processes commands one at a time. That
//! makes every check-then-write (capacity, versions, status) atomic per
//! session without any lock. Every command carries the caller and is
//! authorized against the actor's live membership before it runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tavern_policy::{AuthorizationPolicy, MembershipFacts, Operation, Resource};
use tavern_protocol::{
    DiceRoll, GameState, IdentityId, Message, MessageId, MessageRole, Participant,
    ParticipantRole, ProtocolError, RollId, Session, SessionId, SessionStatus,
};
use tokio::sync::{mpsc, oneshot};

use crate::dice::{DiceRoller, RollOutcome, RollRequest, announcement};
use crate::export::{self, ExportFormat};
use crate::{
    GameStatePatch, MessageDirectory, MessageFilter, Page, PageRequest, TableConfig,
    TableError,
};

/// Counter for generating unique message IDs.
static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Counter for generating unique dice roll IDs.
static NEXT_ROLL_ID: AtomicU64 = AtomicU64::new(1);

/// Posted to the log when a session is completed.
pub const COMPLETION_NOTICE: &str = "The adventure has been completed. Thank you for playing!";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Editable session metadata. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPatch {
    /// Must not be blank.
    pub title: Option<String>,
    /// A blank description clears it.
    pub description: Option<String>,
}

impl SessionPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Activity summary of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub participant_count: usize,
    pub message_count: usize,
    pub dice_roll_count: usize,
    /// Version of the game state, if one exists.
    pub game_state_version: Option<u64>,
    pub created_at: DateTime<Utc>,
    /// Latest of the session's update, last message, last roll and last
    /// game state write.
    pub last_activity: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub(crate) type Reply<T> = oneshot::Sender<Result<T, TableError>>;

/// Commands sent to a session actor through its channel.
///
/// Every variant names the caller and carries a reply channel.
pub(crate) enum SessionCommand {
    /// The session record if `caller` may see it, for listings.
    Describe {
        caller: IdentityId,
        reply: oneshot::Sender<Option<Session>>,
    },
    Get {
        caller: IdentityId,
        reply: Reply<Session>,
    },
    Update {
        caller: IdentityId,
        patch: SessionPatch,
        reply: Reply<Session>,
    },
    SetStatus {
        caller: IdentityId,
        status: SessionStatus,
        reply: Reply<Session>,
    },
    Delete {
        caller: IdentityId,
        reply: Reply<()>,
    },
    Join {
        caller: IdentityId,
        reply: Reply<Participant>,
    },
    RemoveParticipant {
        caller: IdentityId,
        target: IdentityId,
        reply: Reply<bool>,
    },
    SetRole {
        caller: IdentityId,
        target: IdentityId,
        role: ParticipantRole,
        reply: Reply<Participant>,
    },
    ListParticipants {
        caller: IdentityId,
        reply: Reply<Vec<Participant>>,
    },
    AppendMessage {
        caller: IdentityId,
        content: String,
        role: MessageRole,
        reply: Reply<Message>,
    },
    GetMessage {
        caller: IdentityId,
        message_id: MessageId,
        reply: Reply<Message>,
    },
    DeleteMessage {
        caller: IdentityId,
        message_id: MessageId,
        reply: Reply<Message>,
    },
    ListMessages {
        caller: IdentityId,
        filter: MessageFilter,
        reply: Reply<Page<Message>>,
    },
    ClearMessages {
        caller: IdentityId,
        reply: Reply<usize>,
    },
    ExportMessages {
        caller: IdentityId,
        format: ExportFormat,
        reply: Reply<String>,
    },
    ReadGameState {
        caller: IdentityId,
        reply: Reply<GameState>,
    },
    UpsertGameState {
        caller: IdentityId,
        patch: GameStatePatch,
        reply: Reply<GameState>,
    },
    ClearGameState {
        caller: IdentityId,
        reply: Reply<bool>,
    },
    Roll {
        caller: IdentityId,
        request: RollRequest,
        reply: Reply<DiceRoll>,
    },
    ListRolls {
        caller: IdentityId,
        window: PageRequest,
        reply: Reply<Page<DiceRoll>>,
    },
    Stats {
        caller: IdentityId,
        reply: Reply<SessionStats>,
    },
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session actor.
///
/// Cheap to clone; the registry holds one per session and hands out
/// clones so no lock is held across a round-trip.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// A handle whose actor has already stopped.
    #[cfg(test)]
    pub(crate) fn stopped(session_id: SessionId) -> Self {
        let (sender, _) = mpsc::channel(1);
        Self { session_id, sender }
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, TableError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| TableError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| TableError::Unavailable(self.session_id))?
    }

    pub(crate) async fn describe(
        &self,
        caller: IdentityId,
    ) -> Result<Option<Session>, TableError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Describe {
                caller,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TableError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| TableError::Unavailable(self.session_id))
    }

    pub(crate) async fn get(&self, caller: IdentityId) -> Result<Session, TableError> {
        self.request(|reply| SessionCommand::Get { caller, reply }).await
    }

    pub(crate) async fn update(
        &self,
        caller: IdentityId,
        patch: SessionPatch,
    ) -> Result<Session, TableError> {
        self.request(|reply| SessionCommand::Update {
            caller,
            patch,
            reply,
        })
        .await
    }

    pub(crate) async fn set_status(
        &self,
        caller: IdentityId,
        status: SessionStatus,
    ) -> Result<Session, TableError> {
        self.request(|reply| SessionCommand::SetStatus {
            caller,
            status,
            reply,
        })
        .await
    }

    pub(crate) async fn delete(&self, caller: IdentityId) -> Result<(), TableError> {
        self.request(|reply| SessionCommand::Delete { caller, reply })
            .await
    }

    pub(crate) async fn join(&self, caller: IdentityId) -> Result<Participant, TableError> {
        self.request(|reply| SessionCommand::Join { caller, reply })
            .await
    }

    pub(crate) async fn remove_participant(
        &self,
        caller: IdentityId,
        target: IdentityId,
    ) -> Result<bool, TableError> {
        self.request(|reply| SessionCommand::RemoveParticipant {
            caller,
            target,
            reply,
        })
        .await
    }

    pub(crate) async fn set_role(
        &self,
        caller: IdentityId,
        target: IdentityId,
        role: ParticipantRole,
    ) -> Result<Participant, TableError> {
        self.request(|reply| SessionCommand::SetRole {
            caller,
            target,
            role,
            reply,
        })
        .await
    }

    pub(crate) async fn list_participants(
        &self,
        caller: IdentityId,
    ) -> Result<Vec<Participant>, TableError> {
        self.request(|reply| SessionCommand::ListParticipants { caller, reply })
            .await
    }

    pub(crate) async fn append_message(
        &self,
        caller: IdentityId,
        content: String,
        role: MessageRole,
    ) -> Result<Message, TableError> {
        self.request(|reply| SessionCommand::AppendMessage {
            caller,
            content,
            role,
            reply,
        })
        .await
    }

    pub(crate) async fn get_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        self.request(|reply| SessionCommand::GetMessage {
            caller,
            message_id,
            reply,
        })
        .await
    }

    pub(crate) async fn delete_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        self.request(|reply| SessionCommand::DeleteMessage {
            caller,
            message_id,
            reply,
        })
        .await
    }

    pub(crate) async fn list_messages(
        &self,
        caller: IdentityId,
        filter: MessageFilter,
    ) -> Result<Page<Message>, TableError> {
        self.request(|reply| SessionCommand::ListMessages {
            caller,
            filter,
            reply,
        })
        .await
    }

    pub(crate) async fn clear_messages(&self, caller: IdentityId) -> Result<usize, TableError> {
        self.request(|reply| SessionCommand::ClearMessages { caller, reply })
            .await
    }

    pub(crate) async fn export_messages(
        &self,
        caller: IdentityId,
        format: ExportFormat,
    ) -> Result<String, TableError> {
        self.request(|reply| SessionCommand::ExportMessages {
            caller,
            format,
            reply,
        })
        .await
    }

    pub(crate) async fn read_game_state(
        &self,
        caller: IdentityId,
    ) -> Result<GameState, TableError> {
        self.request(|reply| SessionCommand::ReadGameState { caller, reply })
            .await
    }

    pub(crate) async fn upsert_game_state(
        &self,
        caller: IdentityId,
        patch: GameStatePatch,
    ) -> Result<GameState, TableError> {
        self.request(|reply| SessionCommand::UpsertGameState {
            caller,
            patch,
            reply,
        })
        .await
    }

    pub(crate) async fn clear_game_state(&self, caller: IdentityId) -> Result<bool, TableError> {
        self.request(|reply| SessionCommand::ClearGameState { caller, reply })
            .await
    }

    pub(crate) async fn roll(
        &self,
        caller: IdentityId,
        request: RollRequest,
    ) -> Result<DiceRoll, TableError> {
        self.request(|reply| SessionCommand::Roll {
            caller,
            request,
            reply,
        })
        .await
    }

    pub(crate) async fn list_rolls(
        &self,
        caller: IdentityId,
        window: PageRequest,
    ) -> Result<Page<DiceRoll>, TableError> {
        self.request(|reply| SessionCommand::ListRolls {
            caller,
            window,
            reply,
        })
        .await
    }

    pub(crate) async fn stats(&self, caller: IdentityId) -> Result<SessionStats, TableError> {
        self.request(|reply| SessionCommand::Stats { caller, reply })
            .await
    }
}

// ---------------------------------------------------------------------------
// SessionActor
// ---------------------------------------------------------------------------

/// The internal session actor state. Runs inside a Tokio task.
struct SessionActor {
    session: Session,
    /// In join order.
    participants: Vec<Participant>,
    /// In creation order.
    messages: Vec<Message>,
    game_state: Option<GameState>,
    /// Highest game state version ever issued. Survives a clear.
    game_state_version: u64,
    /// In creation order.
    rolls: Vec<DiceRoll>,
    /// Set once the session is deleted. A deleted actor has no rows and
    /// denies every request until its last handle is dropped.
    deleted: bool,
    dice: DiceRoller,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<TableConfig>,
    directory: MessageDirectory,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl MembershipFacts for SessionActor {
    fn session_id(&self) -> SessionId {
        self.session.id
    }

    fn creator(&self) -> IdentityId {
        self.session.creator
    }

    fn participant_role(&self, identity: IdentityId) -> Option<ParticipantRole> {
        self.participants
            .iter()
            .find(|p| p.identity == identity)
            .map(|p| p.role)
    }
}

impl SessionActor {
    /// Runs the actor loop until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(session_id = %self.session.id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Describe { caller, reply } => {
                    let _ = reply.send(self.describe(caller));
                }
                SessionCommand::Get { caller, reply } => {
                    let _ = reply.send(self.handle_get(caller));
                }
                SessionCommand::Update {
                    caller,
                    patch,
                    reply,
                } => {
                    let _ = reply.send(self.handle_update(caller, patch));
                }
                SessionCommand::SetStatus {
                    caller,
                    status,
                    reply,
                } => {
                    let _ = reply.send(self.handle_set_status(caller, status));
                }
                SessionCommand::Delete { caller, reply } => {
                    let _ = reply.send(self.handle_delete(caller));
                }
                SessionCommand::Join { caller, reply } => {
                    let _ = reply.send(self.handle_join(caller));
                }
                SessionCommand::RemoveParticipant {
                    caller,
                    target,
                    reply,
                } => {
                    let _ = reply.send(self.handle_remove_participant(caller, target));
                }
                SessionCommand::SetRole {
                    caller,
                    target,
                    role,
                    reply,
                } => {
                    let _ = reply.send(self.handle_set_role(caller, target, role));
                }
                SessionCommand::ListParticipants { caller, reply } => {
                    let _ = reply.send(self.handle_list_participants(caller));
                }
                SessionCommand::AppendMessage {
                    caller,
                    content,
                    role,
                    reply,
                } => {
                    let _ = reply.send(self.handle_append_message(caller, content, role));
                }
                SessionCommand::GetMessage {
                    caller,
                    message_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_get_message(caller, message_id));
                }
                SessionCommand::DeleteMessage {
                    caller,
                    message_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_delete_message(caller, message_id));
                }
                SessionCommand::ListMessages {
                    caller,
                    filter,
                    reply,
                } => {
                    let _ = reply.send(self.handle_list_messages(caller, filter));
                }
                SessionCommand::ClearMessages { caller, reply } => {
                    let _ = reply.send(self.handle_clear_messages(caller));
                }
                SessionCommand::ExportMessages {
                    caller,
                    format,
                    reply,
                } => {
                    let _ = reply.send(self.handle_export_messages(caller, format));
                }
                SessionCommand::ReadGameState { caller, reply } => {
                    let _ = reply.send(self.handle_read_game_state(caller));
                }
                SessionCommand::UpsertGameState {
                    caller,
                    patch,
                    reply,
                } => {
                    let _ = reply.send(self.handle_upsert_game_state(caller, patch));
                }
                SessionCommand::ClearGameState { caller, reply } => {
                    let _ = reply.send(self.handle_clear_game_state(caller));
                }
                SessionCommand::Roll {
                    caller,
                    request,
                    reply,
                } => {
                    let _ = reply.send(self.handle_roll(caller, request));
                }
                SessionCommand::ListRolls {
                    caller,
                    window,
                    reply,
                } => {
                    let _ = reply.send(self.handle_list_rolls(caller, window));
                }
                SessionCommand::Stats { caller, reply } => {
                    let _ = reply.send(self.handle_stats(caller));
                }
            }
        }

        tracing::info!(session_id = %self.session.id, "session actor stopped");
    }

    /// Asks the policy. A deleted session has no facts, so every
    /// session-scoped request is denied exactly like a missing session.
    fn authorize(
        &self,
        caller: IdentityId,
        op: Operation,
        resource: Resource,
    ) -> Result<(), TableError> {
        let facts: Option<&dyn MembershipFacts> = if self.deleted { None } else { Some(self) };
        self.policy
            .require(caller, facts, op, &resource)
            .map_err(|denied| {
                tracing::debug!(
                    session_id = %self.session.id,
                    %caller,
                    %op,
                    resource = resource.kind(),
                    "request denied"
                );
                denied.into()
            })
    }

    fn describe(&self, caller: IdentityId) -> Option<Session> {
        if self.deleted || !self.is_accessible_to(caller) {
            return None;
        }
        Some(self.session.clone())
    }

    // =====================================================================
    // Session record
    // =====================================================================

    fn handle_get(&self, caller: IdentityId) -> Result<Session, TableError> {
        self.authorize(caller, Operation::Read, Resource::Session)?;
        Ok(self.session.clone())
    }

    fn handle_update(
        &mut self,
        caller: IdentityId,
        patch: SessionPatch,
    ) -> Result<Session, TableError> {
        self.authorize(caller, Operation::Update, Resource::Session)?;

        let title = match patch.title {
            Some(title) => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(ProtocolError::Empty("title").into());
                }
                Some(title.to_owned())
            }
            None => None,
        };
        if let Some(title) = title {
            self.session.title = title;
        }
        if let Some(description) = patch.description {
            let description = description.trim();
            self.session.description =
                (!description.is_empty()).then(|| description.to_owned());
        }
        self.session.updated_at = Utc::now();

        tracing::info!(session_id = %self.session.id, "session updated");
        Ok(self.session.clone())
    }

    fn handle_set_status(
        &mut self,
        caller: IdentityId,
        status: SessionStatus,
    ) -> Result<Session, TableError> {
        self.authorize(caller, Operation::Update, Resource::Session)?;

        let current = self.session.status;
        if current == status {
            return Ok(self.session.clone());
        }
        if !current.can_transition_to(status) {
            return Err(TableError::InvalidState(format!(
                "cannot move session from {current} to {status}"
            )));
        }

        self.session.status = status;
        self.session.updated_at = Utc::now();
        tracing::info!(
            session_id = %self.session.id,
            from = %current,
            to = %status,
            "session status changed"
        );

        if status == SessionStatus::Completed {
            self.post_system(COMPLETION_NOTICE.to_owned());
        }
        Ok(self.session.clone())
    }

    /// Cascades: participants, messages, game state and rolls go with the
    /// session.
    fn handle_delete(&mut self, caller: IdentityId) -> Result<(), TableError> {
        self.authorize(caller, Operation::Delete, Resource::Session)?;

        for message in &self.messages {
            self.directory.forget(message.id);
        }
        tracing::info!(
            session_id = %self.session.id,
            participants = self.participants.len(),
            messages = self.messages.len(),
            rolls = self.rolls.len(),
            "session deleted"
        );

        self.deleted = true;
        self.participants.clear();
        self.messages.clear();
        self.game_state = None;
        self.rolls.clear();
        Ok(())
    }

    fn handle_stats(&self, caller: IdentityId) -> Result<SessionStats, TableError> {
        self.authorize(caller, Operation::Read, Resource::Session)?;

        let last_activity = [
            Some(self.session.updated_at),
            self.messages.last().map(|m| m.created_at),
            self.rolls.last().map(|r| r.created_at),
            self.game_state.as_ref().map(|g| g.updated_at),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.session.updated_at);

        Ok(SessionStats {
            session_id: self.session.id,
            status: self.session.status,
            participant_count: self.participants.len(),
            message_count: self.messages.len(),
            dice_roll_count: self.rolls.len(),
            game_state_version: self.game_state.as_ref().map(|g| g.version),
            created_at: self.session.created_at,
            last_activity,
        })
    }

    // =====================================================================
    // Participants
    // =====================================================================

    fn handle_join(&mut self, caller: IdentityId) -> Result<Participant, TableError> {
        self.authorize(
            caller,
            Operation::Create,
            Resource::Participant { identity: caller },
        )?;

        if self.is_accessible_to(caller) {
            return Err(TableError::AlreadyJoined(caller, self.session.id));
        }
        if !self.session.status.is_joinable() {
            return Err(TableError::InvalidState(format!(
                "cannot join session in status {}",
                self.session.status
            )));
        }
        if self.participants.len() >= self.session.max_players {
            return Err(TableError::SessionFull(self.session.id));
        }

        let now = Utc::now();
        let participant = Participant {
            session_id: self.session.id,
            identity: caller,
            role: ParticipantRole::Player,
            joined_at: now,
            last_active: now,
        };
        self.participants.push(participant.clone());
        tracing::info!(
            session_id = %self.session.id,
            identity = %caller,
            participants = self.participants.len(),
            "participant joined"
        );
        Ok(participant)
    }

    /// Returns `Ok(false)` if `target` was not a participant.
    fn handle_remove_participant(
        &mut self,
        caller: IdentityId,
        target: IdentityId,
    ) -> Result<bool, TableError> {
        self.authorize(
            caller,
            Operation::Delete,
            Resource::Participant { identity: target },
        )?;

        let before = self.participants.len();
        self.participants.retain(|p| p.identity != target);
        let removed = self.participants.len() < before;
        if removed {
            tracing::info!(
                session_id = %self.session.id,
                identity = %target,
                by = %caller,
                participants = self.participants.len(),
                "participant left"
            );
        }
        Ok(removed)
    }

    fn handle_set_role(
        &mut self,
        caller: IdentityId,
        target: IdentityId,
        role: ParticipantRole,
    ) -> Result<Participant, TableError> {
        self.authorize(
            caller,
            Operation::Update,
            Resource::Participant { identity: target },
        )?;

        let session_id = self.session.id;
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.identity == target)
            .ok_or(TableError::ParticipantNotFound(target, session_id))?;
        participant.role = role;
        tracing::info!(%session_id, identity = %target, %role, "participant role changed");
        Ok(participant.clone())
    }

    fn handle_list_participants(
        &self,
        caller: IdentityId,
    ) -> Result<Vec<Participant>, TableError> {
        self.authorize(
            caller,
            Operation::Read,
            Resource::Participant { identity: caller },
        )?;
        Ok(self.participants.clone())
    }

    /// Marks `identity` as active now, if it is a participant.
    fn touch(&mut self, identity: IdentityId, now: DateTime<Utc>) {
        if let Some(p) = self.participants.iter_mut().find(|p| p.identity == identity) {
            p.last_active = now;
        }
    }

    // =====================================================================
    // Message log
    // =====================================================================

    fn handle_append_message(
        &mut self,
        caller: IdentityId,
        content: String,
        role: MessageRole,
    ) -> Result<Message, TableError> {
        self.authorize(
            caller,
            Operation::Create,
            Resource::Message {
                author: Some(caller),
            },
        )?;
        if !self.session.status.allows_messages() {
            return Err(TableError::InvalidState(format!(
                "cannot post to session in status {}",
                self.session.status
            )));
        }
        if content.trim().is_empty() {
            return Err(ProtocolError::Empty("content").into());
        }
        ProtocolError::check_range(
            "content length",
            content.chars().count() as i64,
            1,
            self.config.max_message_len as i64,
        )?;

        let message = self.push_message(Some(caller), content, role);
        self.touch(caller, message.created_at);
        tracing::debug!(
            session_id = %self.session.id,
            message_id = %message.id,
            author = %caller,
            %role,
            "message appended"
        );
        Ok(message)
    }

    /// Appends an engine-authored notice. Bypasses the policy.
    fn post_system(&mut self, content: String) -> Message {
        self.push_message(None, content, MessageRole::System)
    }

    fn push_message(
        &mut self,
        author: Option<IdentityId>,
        content: String,
        role: MessageRole,
    ) -> Message {
        let message = Message {
            id: MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)),
            session_id: self.session.id,
            author,
            content,
            role,
            created_at: Utc::now(),
        };
        self.directory.record(message.id, self.session.id);
        self.messages.push(message.clone());
        message
    }

    fn find_message(&self, message_id: MessageId) -> Result<usize, TableError> {
        self.messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or(TableError::MessageNotFound(message_id))
    }

    fn handle_get_message(
        &self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        self.authorize(caller, Operation::Read, Resource::Message { author: None })?;
        let index = self.find_message(message_id)?;
        Ok(self.messages[index].clone())
    }

    fn handle_delete_message(
        &mut self,
        caller: IdentityId,
        message_id: MessageId,
    ) -> Result<Message, TableError> {
        // Outsiders learn nothing about which messages exist.
        self.authorize(caller, Operation::Read, Resource::Message { author: None })?;
        let index = self.find_message(message_id)?;
        let author = self.messages[index].author;
        self.authorize(caller, Operation::Delete, Resource::Message { author })?;

        let message = self.messages.remove(index);
        self.directory.forget(message_id);
        tracing::info!(
            session_id = %self.session.id,
            %message_id,
            by = %caller,
            "message deleted"
        );
        Ok(message)
    }

    fn handle_list_messages(
        &self,
        caller: IdentityId,
        filter: MessageFilter,
    ) -> Result<Page<Message>, TableError> {
        self.authorize(caller, Operation::Read, Resource::Message { author: None })?;
        filter.window().validate(self.config.max_page_size)?;
        Ok(filter.apply(&self.messages))
    }

    /// Deletes the whole log. Only the creator passes a delete check on a
    /// message with no author.
    fn handle_clear_messages(&mut self, caller: IdentityId) -> Result<usize, TableError> {
        self.authorize(caller, Operation::Delete, Resource::Message { author: None })?;

        for message in &self.messages {
            self.directory.forget(message.id);
        }
        let cleared = self.messages.len();
        self.messages.clear();
        tracing::info!(session_id = %self.session.id, by = %caller, cleared, "messages cleared");
        Ok(cleared)
    }

    fn handle_export_messages(
        &self,
        caller: IdentityId,
        format: ExportFormat,
    ) -> Result<String, TableError> {
        self.authorize(caller, Operation::Read, Resource::Message { author: None })?;
        let out = export::render(format, &self.session, &self.messages, Utc::now())?;
        tracing::debug!(
            session_id = %self.session.id,
            by = %caller,
            %format,
            messages = self.messages.len(),
            "messages exported"
        );
        Ok(out)
    }

    // =====================================================================
    // Game state
    // =====================================================================

    fn ensure_writable(&self) -> Result<(), TableError> {
        if self.session.status == SessionStatus::Completed {
            return Err(TableError::InvalidState(
                "game state of a completed session is read-only".into(),
            ));
        }
        Ok(())
    }

    fn handle_read_game_state(&self, caller: IdentityId) -> Result<GameState, TableError> {
        self.authorize(caller, Operation::Read, Resource::GameState)?;
        self.game_state
            .clone()
            .ok_or(TableError::GameStateNotFound(self.session.id))
    }

    fn handle_upsert_game_state(
        &mut self,
        caller: IdentityId,
        patch: GameStatePatch,
    ) -> Result<GameState, TableError> {
        let op = if self.game_state.is_some() {
            Operation::Update
        } else {
            Operation::Create
        };
        self.authorize(caller, op, Resource::GameState)?;
        self.ensure_writable()?;

        let next = patch.apply(
            self.session.id,
            self.game_state.as_ref(),
            self.game_state_version,
            Utc::now(),
        )?;
        tracing::debug!(
            session_id = %self.session.id,
            by = %caller,
            version = next.version,
            "game state written"
        );
        self.game_state_version = next.version;
        self.game_state = Some(next.clone());
        Ok(next)
    }

    /// Returns `Ok(false)` if there was no document.
    fn handle_clear_game_state(&mut self, caller: IdentityId) -> Result<bool, TableError> {
        self.authorize(caller, Operation::Delete, Resource::GameState)?;
        self.ensure_writable()?;

        let cleared = self.game_state.take().is_some();
        if cleared {
            tracing::info!(session_id = %self.session.id, by = %caller, "game state cleared");
        }
        Ok(cleared)
    }

    // =====================================================================
    // Dice
    // =====================================================================

    fn handle_roll(
        &mut self,
        caller: IdentityId,
        request: RollRequest,
    ) -> Result<DiceRoll, TableError> {
        self.authorize(caller, Operation::Create, Resource::DiceRoll)?;
        if !self.session.status.allows_rolls() {
            return Err(TableError::InvalidState(format!(
                "cannot roll in session with status {}",
                self.session.status
            )));
        }
        let request = request.validate(&self.config)?;

        let faces = self.dice.throw(request.dice_type, request.count);
        let outcome = RollOutcome::evaluate(&request, faces, self.config.default_difficulty);
        let text = self.config.announce_rolls.then(|| announcement(&request, &outcome));

        let roll = DiceRoll {
            id: RollId(NEXT_ROLL_ID.fetch_add(1, Ordering::Relaxed)),
            session_id: self.session.id,
            identity: Some(caller),
            dice_type: request.dice_type,
            count: request.count,
            modifier: request.modifier,
            rolls: outcome.rolls,
            total: outcome.total,
            final_result: outcome.final_result,
            skill_name: request.skill_name,
            success: outcome.success,
            created_at: Utc::now(),
        };
        self.rolls.push(roll.clone());
        self.touch(caller, roll.created_at);
        if let Some(text) = text {
            self.post_system(text);
        }

        tracing::info!(
            session_id = %self.session.id,
            roll_id = %roll.id,
            by = %caller,
            dice = %roll.dice_type,
            count = roll.count,
            result = roll.final_result,
            "dice rolled"
        );
        Ok(roll)
    }

    /// Newest first.
    fn handle_list_rolls(
        &self,
        caller: IdentityId,
        window: PageRequest,
    ) -> Result<Page<DiceRoll>, TableError> {
        self.authorize(caller, Operation::Read, Resource::DiceRoll)?;
        window.validate(self.config.max_page_size)?;
        Ok(window.slice(self.rolls.iter().rev().cloned().collect()))
    }
}

/// Spawns a new session actor task and returns a handle to communicate
/// with it.
///
/// The command channel is bounded by `config.command_buffer`; senders wait
/// when it fills up.
pub(crate) fn spawn_session(
    session: Session,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<TableConfig>,
    directory: MessageDirectory,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer);
    let session_id = session.id;
    let dice = match config.dice_seed {
        Some(seed) => DiceRoller::from_seed(seed.wrapping_add(session_id.0)),
        None => DiceRoller::from_os_rng(),
    };

    let actor = SessionActor {
        session,
        participants: Vec::new(),
        messages: Vec::new(),
        game_state: None,
        game_state_version: 0,
        rolls: Vec::new(),
        deleted: false,
        dice,
        policy,
        config,
        directory,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
