//! Identity hook: who is calling?
//!
//! Tavern doesn't issue or verify identities itself. Your auth provider
//! (JWT validation, an OAuth introspection endpoint, a signed cookie...)
//! does that. Tavern defines the [`IdentityProvider`] trait, a single async
//! method that turns a credential into a [`VerifiedIdentity`], and trusts
//! whatever it returns for the rest of the request.

use serde::{Deserialize, Serialize};
use tavern_protocol::IdentityId;

use crate::ProfileError;

/// A caller identity that the provider has verified.
///
/// The optional fields are signup metadata. They are only consulted the
/// first time the identity is seen, to seed its profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Stable id issued by the identity provider.
    pub id: IdentityId,
    /// Contact address. Its local part becomes the default display name.
    pub email: Option<String>,
    /// Explicit display name chosen at signup.
    pub display_name: Option<String>,
    /// Requested username. Must be globally unique.
    pub username: Option<String>,
}

impl VerifiedIdentity {
    /// An identity with no signup metadata.
    pub fn new(id: IdentityId) -> Self {
        Self {
            id,
            email: None,
            display_name: None,
            username: None,
        }
    }

    /// Sets the contact address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the explicit display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the requested username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Verifies a caller credential and returns the caller's identity.
///
/// `Send + Sync + 'static` because one provider is shared by every request
/// task for the lifetime of the service.
///
/// # Example
///
/// ```rust
/// use tavern_identity::{IdentityProvider, ProfileError, VerifiedIdentity};
/// use tavern_protocol::IdentityId;
///
/// /// Treats the credential as a numeric user id. Development only.
/// struct DevProvider;
///
/// impl IdentityProvider for DevProvider {
///     async fn verify(
///         &self,
///         credential: &str,
///     ) -> Result<VerifiedIdentity, ProfileError> {
///         let id: u64 = credential.parse().map_err(|_| {
///             ProfileError::AuthFailed("credential must be a number".into())
///         })?;
///         Ok(VerifiedIdentity::new(IdentityId(id)))
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Verifies `credential` and returns who it belongs to.
    ///
    /// # Errors
    /// [`ProfileError::AuthFailed`] when the credential is invalid,
    /// expired, or unknown.
    fn verify(
        &self,
        credential: &str,
    ) -> impl std::future::Future<Output = Result<VerifiedIdentity, ProfileError>> + Send;
}
