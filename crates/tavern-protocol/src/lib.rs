//! Shared vocabulary for Tavern.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Identifiers** ([`IdentityId`], [`SessionId`], [`MessageId`],
//!   [`RollId`]) — newtypes so ids of different tables never mix.
//! - **Enumerations** ([`SessionStatus`], [`MessageRole`], [`DiceType`], ...)
//!   with their string forms and parsing rules.
//! - **Records** ([`Profile`], [`Session`], [`Participant`], [`Message`],
//!   [`GameState`], [`DiceRoll`]) — the persisted rows.
//! - **Errors** ([`ErrorKind`], [`ProtocolError`]) — the error taxonomy
//!   surfaced to callers, and the validation failures raised while parsing.
//!
//! # Architecture
//!
//! ```text
//! Identity (who)  ─┐
//! Policy (may?)   ─┼─→ Protocol (these types)
//! Table (do it)   ─┘
//! ```
//!
//! Nothing here knows about authorization or concurrency; it only knows
//! what a valid value looks like.

mod error;
mod records;
mod types;

pub use error::{ErrorKind, ProtocolError};
pub use records::{
    DiceRoll, GameState, Message, Participant, Profile, Session, Variables,
};
pub use types::{
    DiceType, IdentityId, MessageId, MessageRole, ParticipantRole,
    ProfileRole, RollId, SessionId, SessionStatus,
};
