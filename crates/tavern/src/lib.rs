//! # Tavern
//!
//! Access control and consistency core for shared tabletop sessions.
//!
//! Many people play in one session at a time: they join and leave, post to
//! the session's log, roll dice and read the shared game state, while the
//! session's creator runs the table. Tavern decides who may do what and
//! keeps the shared rows consistent under concurrent use.
//!
//! Every request flows through the same stages:
//!
//! ```text
//! credential ─→ IdentityProvider::verify ─→ ProfileProvisioner::ensure
//!            ─→ AuthorizationPolicy ─→ session actor (rows)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tavern::prelude::*;
//!
//! struct DevProvider;
//!
//! impl IdentityProvider for DevProvider {
//!     async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, ProfileError> {
//!         let id = credential
//!             .parse()
//!             .map_err(|_| ProfileError::AuthFailed("not a number".into()))?;
//!         Ok(VerifiedIdentity::new(IdentityId(id)))
//!     }
//! }
//!
//! # async fn run() -> Result<(), TavernError> {
//! let tavern = Tavern::<DevProvider>::builder().build(DevProvider)?;
//! let gm = tavern.authenticate("1").await?;
//! let session = tavern
//!     .create_session(&gm, NewSession::new().title("The Sunken Crypt"))
//!     .await?;
//! tavern
//!     .roll(&gm, session.id, RollRequest::new(DiceType::D20).skill("Perception"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod service;
pub mod telemetry;

pub use config::TavernConfig;
pub use error::TavernError;
pub use service::{Caller, Tavern, TavernBuilder};

pub mod prelude {
    //! Everything needed to embed Tavern.

    pub use crate::{Caller, Tavern, TavernBuilder, TavernConfig, TavernError};
    pub use tavern_identity::{
        IdentityProvider, ProfileError, ProfilePatch, ProvisionerConfig, VerifiedIdentity,
    };
    pub use tavern_policy::PolicyConfig;
    pub use tavern_protocol::{
        DiceRoll, DiceType, ErrorKind, GameState, IdentityId, Message, MessageId, MessageRole,
        Participant, ParticipantRole, Profile, ProfileRole, Session, SessionId, SessionStatus,
        Variables,
    };
    pub use tavern_table::{
        ExportFormat, GameStatePatch, MessageFilter, NewSession, Page, PageRequest, RollRequest,
        SessionFilter, SessionPatch, SessionStats, TableConfig,
    };
}
