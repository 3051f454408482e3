//! The profile provisioner: one profile per identity, created on first
//! contact.
//!
//! Responsibilities:
//! - Creating a profile the first time an identity is seen ([`ensure`])
//! - Keeping usernames globally unique (case-insensitive)
//! - Letting owners, and only owners, edit their profile
//!
//! # Concurrency note
//!
//! `ProfileProvisioner` is a plain single-owner structure. The service
//! layer wraps it in a lock; nothing here blocks or awaits.
//!
//! [`ensure`]: ProfileProvisioner::ensure

use std::collections::HashMap;

use chrono::Utc;
use tavern_protocol::{IdentityId, Profile, ProfileRole, ProtocolError};

use crate::{ProfileError, ProfilePatch, ProvisionerConfig, VerifiedIdentity};

/// Owns every profile, keyed by identity.
pub struct ProfileProvisioner {
    /// All profiles. One entry per identity ever seen.
    profiles: HashMap<IdentityId, Profile>,

    /// Index from normalized username to owner. Kept in sync with
    /// `profiles` so uniqueness checks are O(1).
    usernames: HashMap<String, IdentityId>,

    config: ProvisionerConfig,
}

impl ProfileProvisioner {
    /// Creates an empty provisioner.
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            profiles: HashMap::new(),
            usernames: HashMap::new(),
            config,
        }
    }

    /// Returns the profile for `identity`, creating it on first contact.
    ///
    /// Idempotent: for a known identity the existing profile is returned
    /// unchanged and the signup metadata is ignored.
    ///
    /// The display name is the explicit name if given, else the local part
    /// of the contact address, else the configured default.
    ///
    /// # Errors
    /// - [`ProfileError::UsernameTaken`] — requested username is in use
    /// - [`ProfileError::Invalid`] — requested username is malformed
    pub fn ensure(
        &mut self,
        identity: &VerifiedIdentity,
    ) -> Result<&Profile, ProfileError> {
        if self.profiles.contains_key(&identity.id) {
            return self.profile(identity.id);
        }

        let username = match identity.username.as_deref() {
            Some(raw) => Some(self.claimable_username(raw, identity.id)?),
            None => None,
        };

        let display_name = self.derive_display_name(identity);
        let now = Utc::now();
        let profile = Profile {
            id: identity.id,
            username: username.clone(),
            display_name,
            avatar_url: None,
            role: ProfileRole::Player,
            created_at: now,
            updated_at: now,
        };

        if let Some(name) = username {
            self.usernames.insert(name, identity.id);
        }
        self.profiles.insert(identity.id, profile);

        tracing::info!(identity = %identity.id, "profile provisioned");
        self.profile(identity.id)
    }

    /// Looks up a profile. Profiles are public: any caller may read any.
    pub fn get(&self, identity: &IdentityId) -> Option<&Profile> {
        self.profiles.get(identity)
    }

    /// Like [`get`](Self::get) but reports a missing profile as an error.
    pub fn profile(&self, identity: IdentityId) -> Result<&Profile, ProfileError> {
        self.profiles
            .get(&identity)
            .ok_or(ProfileError::NotFound(identity))
    }

    /// Finds a profile by username (case-insensitive).
    pub fn find_by_username(&self, username: &str) -> Option<&Profile> {
        let key = username.trim().to_lowercase();
        self.usernames
            .get(&key)
            .and_then(|id| self.profiles.get(id))
    }

    /// Applies `patch` to `target`'s profile on behalf of `caller`.
    ///
    /// # Errors
    /// - [`ProfileError::Forbidden`] — `caller` is not `target`
    /// - [`ProfileError::NotFound`] — `target` was never provisioned
    /// - [`ProfileError::UsernameTaken`] — the new username is in use
    /// - [`ProfileError::Invalid`] — a field failed validation
    pub fn update(
        &mut self,
        caller: IdentityId,
        target: IdentityId,
        patch: ProfilePatch,
    ) -> Result<&Profile, ProfileError> {
        if caller != target {
            tracing::debug!(%caller, %target, "profile update denied");
            return Err(ProfileError::Forbidden);
        }
        if !self.profiles.contains_key(&target) {
            return Err(ProfileError::NotFound(target));
        }

        // Validate everything before touching state so a failed patch
        // leaves the profile as it was.
        let username = match patch.username.as_deref() {
            Some(raw) => Some(self.claimable_username(raw, target)?),
            None => None,
        };
        let display_name = match patch.display_name.as_deref() {
            Some(raw) => Some(
                self.config
                    .clean_display_name(raw)
                    .ok_or(ProtocolError::Empty("display name"))?,
            ),
            None => None,
        };

        let profile = self
            .profiles
            .get_mut(&target)
            .ok_or(ProfileError::NotFound(target))?;

        if let Some(name) = username {
            if let Some(old) = profile.username.take() {
                self.usernames.remove(&old);
            }
            self.usernames.insert(name.clone(), target);
            profile.username = Some(name);
        }
        if let Some(name) = display_name {
            profile.display_name = name;
        }
        if let Some(url) = patch.avatar_url {
            let url = url.trim();
            profile.avatar_url = (!url.is_empty()).then(|| url.to_string());
        }
        profile.updated_at = Utc::now();

        tracing::info!(identity = %target, "profile updated");
        Ok(&*profile)
    }

    /// Returns the number of provisioned profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns `true` if no profile has been provisioned.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Normalizes `raw` and checks nobody except `claimant` holds it.
    fn claimable_username(
        &self,
        raw: &str,
        claimant: IdentityId,
    ) -> Result<String, ProfileError> {
        let name = self.config.normalize_username(raw)?;
        match self.usernames.get(&name) {
            Some(owner) if *owner != claimant => {
                Err(ProfileError::UsernameTaken(name))
            }
            _ => Ok(name),
        }
    }

    fn derive_display_name(&self, identity: &VerifiedIdentity) -> String {
        identity
            .display_name
            .as_deref()
            .and_then(|n| self.config.clean_display_name(n))
            .or_else(|| {
                identity
                    .email
                    .as_deref()
                    .and_then(email_local_part)
                    .and_then(|n| self.config.clean_display_name(n))
            })
            .unwrap_or_else(|| self.config.default_display_name.clone())
    }
}

impl Default for ProfileProvisioner {
    fn default() -> Self {
        Self::new(ProvisionerConfig::default())
    }
}

/// Returns the part of an address before `@`, or `None` if the address
/// has no `@` or nothing precedes it.
fn email_local_part(email: &str) -> Option<&str> {
    let (local, _domain) = email.split_once('@')?;
    let local = local.trim();
    (!local.is_empty()).then_some(local)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(id: u64) -> IdentityId {
        IdentityId(id)
    }

    fn provisioner() -> ProfileProvisioner {
        ProfileProvisioner::default()
    }

    // =====================================================================
    // ensure()
    // =====================================================================

    #[test]
    fn test_ensure_new_identity_uses_email_local_part() {
        let mut p = provisioner();
        let identity =
            VerifiedIdentity::new(uid(1)).with_email("thorin@erebor.me");

        let profile = p.ensure(&identity).unwrap();

        assert_eq!(profile.display_name, "thorin");
        assert_eq!(profile.role, ProfileRole::Player);
        assert!(profile.username.is_none());
    }

    #[test]
    fn test_ensure_prefers_explicit_display_name() {
        let mut p = provisioner();
        let identity = VerifiedIdentity::new(uid(1))
            .with_email("thorin@erebor.me")
            .with_display_name("Thorin Oakenshield");

        let profile = p.ensure(&identity).unwrap();

        assert_eq!(profile.display_name, "Thorin Oakenshield");
    }

    #[test]
    fn test_ensure_without_metadata_uses_default_name() {
        let mut p = provisioner();

        let profile = p.ensure(&VerifiedIdentity::new(uid(1))).unwrap();

        assert_eq!(profile.display_name, "Adventurer");
    }

    #[test]
    fn test_ensure_address_without_at_uses_default_name() {
        let mut p = provisioner();
        let identity = VerifiedIdentity::new(uid(1)).with_email("not-an-address");

        let profile = p.ensure(&identity).unwrap();

        assert_eq!(profile.display_name, "Adventurer");
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut p = provisioner();
        let first = p
            .ensure(&VerifiedIdentity::new(uid(1)).with_email("a@b.c"))
            .unwrap()
            .clone();

        // Second contact with different metadata must not change anything.
        let second = p
            .ensure(&VerifiedIdentity::new(uid(1)).with_display_name("Other"))
            .unwrap();

        assert_eq!(&first, second);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_ensure_duplicate_username_returns_taken() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1)).with_username("Bilbo"))
            .unwrap();

        let result =
            p.ensure(&VerifiedIdentity::new(uid(2)).with_username("bilbo"));

        assert!(matches!(result, Err(ProfileError::UsernameTaken(n)) if n == "bilbo"));
        assert!(p.get(&uid(2)).is_none(), "no profile on failed provisioning");
    }

    // =====================================================================
    // update()
    // =====================================================================

    #[test]
    fn test_update_own_profile_succeeds() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1))).unwrap();

        let profile = p
            .update(
                uid(1),
                uid(1),
                ProfilePatch {
                    username: Some("Samwise".into()),
                    display_name: Some("Sam".into()),
                    avatar_url: Some("https://shire.example/sam.png".into()),
                },
            )
            .unwrap();

        assert_eq!(profile.username.as_deref(), Some("samwise"));
        assert_eq!(profile.display_name, "Sam");
        assert!(profile.avatar_url.is_some());
        assert_eq!(p.find_by_username("SAMWISE").unwrap().id, uid(1));
    }

    #[test]
    fn test_update_other_profile_returns_forbidden() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1))).unwrap();
        p.ensure(&VerifiedIdentity::new(uid(2))).unwrap();

        let result = p.update(uid(2), uid(1), ProfilePatch::default());

        assert!(matches!(result, Err(ProfileError::Forbidden)));
    }

    #[test]
    fn test_update_rename_frees_old_username() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1)).with_username("frodo"))
            .unwrap();
        p.ensure(&VerifiedIdentity::new(uid(2))).unwrap();

        p.update(
            uid(1),
            uid(1),
            ProfilePatch {
                username: Some("mr-underhill".into()),
                ..ProfilePatch::default()
            },
        )
        .unwrap();

        // The old name is free for somebody else now.
        let taken_by_two = p.update(
            uid(2),
            uid(2),
            ProfilePatch {
                username: Some("frodo".into()),
                ..ProfilePatch::default()
            },
        );
        assert!(taken_by_two.is_ok());
        assert!(p.find_by_username("mr-underhill").is_some());
    }

    #[test]
    fn test_update_keeping_own_username_is_not_a_conflict() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1)).with_username("merry"))
            .unwrap();

        let result = p.update(
            uid(1),
            uid(1),
            ProfilePatch {
                username: Some("Merry".into()),
                ..ProfilePatch::default()
            },
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_update_taken_username_leaves_profile_unchanged() {
        let mut p = provisioner();
        p.ensure(&VerifiedIdentity::new(uid(1)).with_username("pippin"))
            .unwrap();
        p.ensure(&VerifiedIdentity::new(uid(2)).with_display_name("Merry"))
            .unwrap();

        let result = p.update(
            uid(2),
            uid(2),
            ProfilePatch {
                username: Some("pippin".into()),
                display_name: Some("Changed".into()),
                avatar_url: None,
            },
        );

        assert!(matches!(result, Err(ProfileError::UsernameTaken(_))));
        assert_eq!(p.get(&uid(2)).unwrap().display_name, "Merry");
    }

    #[test]
    fn test_update_unknown_profile_returns_not_found() {
        let mut p = provisioner();

        let result = p.update(uid(9), uid(9), ProfilePatch::default());

        assert!(matches!(result, Err(ProfileError::NotFound(id)) if id == uid(9)));
    }

    #[test]
    fn test_error_kinds_map_to_taxonomy() {
        use tavern_protocol::ErrorKind;
        assert_eq!(ProfileError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(
            ProfileError::UsernameTaken("x".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(ProfileError::NotFound(uid(1)).kind(), ErrorKind::NotFound);
    }
}
