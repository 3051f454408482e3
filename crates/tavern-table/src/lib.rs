//! Session tables for Tavern.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns its
//! participants, message log, game state and dice rolls. The
//! [`SessionRegistry`] creates sessions and routes every request to the
//! owning actor, which authorizes it with the
//! [`AuthorizationPolicy`](tavern_policy::AuthorizationPolicy) before
//! touching any row.
//!
//! # Key types
//!
//! - [`SessionRegistry`] — creates/deletes sessions, routes requests
//! - [`GameStatePatch`] — a versioned, shallow-merged game state write
//! - [`RollRequest`] / [`DiceRoller`] — dice rolls and their evaluation
//! - [`MessageFilter`] / [`SessionFilter`] / [`Page`] — listings
//! - [`ExportFormat`] — message log exports (json, txt, csv)
//! - [`TableConfig`] — limits (player counts, dice, page sizes)

mod config;
mod dice;
mod directory;
mod error;
mod export;
mod game_state;
mod query;
mod registry;
mod table;

pub use config::{DICE_COUNT_LIMIT, PLAYER_LIMIT, TableConfig};
pub use dice::{DiceRoller, RollOutcome, RollRequest, announcement};
pub use directory::MessageDirectory;
pub use error::TableError;
pub use export::{ExportFormat, role_label};
pub use game_state::GameStatePatch;
pub use query::{MessageFilter, Page, PageRequest, SessionFilter};
pub use registry::{NewSession, SessionRegistry};
pub use table::{COMPLETION_NOTICE, SessionPatch, SessionStats};
