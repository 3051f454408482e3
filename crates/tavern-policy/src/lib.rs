//! Authorization policy for Tavern.
//!
//! Every read and write in Tavern asks one question first: may this caller
//! perform this operation on this resource, given who created the session
//! and who has joined it? [`AuthorizationPolicy::can_access`] answers it.
//!
//! The policy is a pure function. It owns no data and has no side effects;
//! callers hand it the membership facts of the session in question through
//! the [`MembershipFacts`] trait.
//!
//! # Key types
//!
//! - [`AuthorizationPolicy`] — the decision function
//! - [`Operation`] / [`Resource`] — what is being attempted
//! - [`MembershipFacts`] / [`SessionFacts`] — who owns and who joined
//! - [`Decision`] / [`Denied`] — the answer

mod facts;
mod policy;

pub use facts::{MembershipFacts, SessionFacts};
pub use policy::{
    AuthorizationPolicy, Decision, Denied, Operation, PolicyConfig, Resource,
};
