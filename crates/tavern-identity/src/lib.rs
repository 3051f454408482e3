//! Caller identity and profile provisioning for Tavern.
//!
//! This crate covers the first thing every request needs:
//!
//! 1. **Verification** — turning a credential into an identity
//!    ([`IdentityProvider`] trait)
//! 2. **Provisioning** — making sure that identity has exactly one profile,
//!    created on first contact ([`ProfileProvisioner`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Table Layer (above)     ← trusts the IdentityId it is handed
//!     ↕
//! Identity Layer (here)   ← verifies callers, owns profiles
//!     ↕
//! Protocol Layer (below)  ← IdentityId, Profile, ProfileRole
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod profile;
mod provisioner;

pub use auth::{IdentityProvider, VerifiedIdentity};
pub use error::ProfileError;
pub use profile::{ProfilePatch, ProvisionerConfig};
pub use provisioner::ProfileProvisioner;
