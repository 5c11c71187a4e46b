//! Collaborator hooks: who is this user, and how big is that space?
//!
//! Plaza doesn't own accounts or spaces. The HTTP service that issues
//! tokens and stores spaces does. Instead, sessions talk to two traits:
//!
//! - [`IdentityVerifier`] turns a bearer token into an [`Identity`].
//! - [`SpaceDirectory`] turns a space id into its grid bounds.
//!
//! Production wires these to [`JwtVerifier`](crate::JwtVerifier) and a
//! configured space table. Tests and development use the static
//! implementations in this module.

use std::collections::HashMap;
use std::future::Future;

use plaza_protocol::{SpaceBounds, SpaceId, UserId};

use crate::SessionError;

/// Who a verified token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub user_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// Validates a client's bearer token and returns its identity.
///
/// `Send + Sync + 'static` so one verifier can be shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use plaza_session::{Identity, IdentityVerifier, SessionError};
///
/// /// Treats the token itself as the user id. Development only.
/// struct EchoVerifier;
///
/// impl IdentityVerifier for EchoVerifier {
///     async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::AuthFailed("empty token".into()));
///         }
///         Ok(Identity::new(token, token))
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Returns the identity behind `token`, or
    /// `SessionError::AuthFailed` if the token is invalid or expired.
    fn verify(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Looks up the grid dimensions of a space.
pub trait SpaceDirectory: Send + Sync + 'static {
    /// Returns the bounds of `space_id`, or
    /// `SessionError::SpaceNotFound` if there is no such space.
    fn space_bounds(
        &self,
        space_id: &SpaceId,
    ) -> impl Future<Output = Result<SpaceBounds, SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// Static implementations
// ---------------------------------------------------------------------------

/// A fixed token → identity table.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as belonging to `identity`.
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}

/// An in-memory space table.
#[derive(Debug, Clone, Default)]
pub struct StaticSpaces {
    spaces: HashMap<SpaceId, SpaceBounds>,
}

impl StaticSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_space(mut self, space_id: impl Into<SpaceId>, bounds: SpaceBounds) -> Self {
        self.spaces.insert(space_id.into(), bounds);
        self
    }

    pub fn insert(&mut self, space_id: SpaceId, bounds: SpaceBounds) {
        self.spaces.insert(space_id, bounds);
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}

impl SpaceDirectory for StaticSpaces {
    async fn space_bounds(&self, space_id: &SpaceId) -> Result<SpaceBounds, SessionError> {
        self.spaces
            .get(space_id)
            .copied()
            .ok_or_else(|| SessionError::SpaceNotFound(space_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier_known_token_returns_identity() {
        let verifier =
            StaticVerifier::new().with_token("tok-a", Identity::new("u1", "alice"));

        let identity = verifier.verify("tok-a").await.unwrap();
        assert_eq!(identity.user_id, UserId::from("u1"));
        assert_eq!(identity.user_name, "alice");
    }

    #[tokio::test]
    async fn test_static_verifier_unknown_token_fails() {
        let verifier = StaticVerifier::new();
        let err = verifier.verify("nope").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_static_spaces_lookup() {
        let spaces = StaticSpaces::new().with_space("s1", SpaceBounds::new(100, 200));

        assert_eq!(
            spaces.space_bounds(&SpaceId::from("s1")).await.unwrap(),
            SpaceBounds::new(100, 200)
        );
        let err = spaces.space_bounds(&SpaceId::from("s2")).await.unwrap_err();
        assert!(matches!(err, SessionError::SpaceNotFound(id) if id.0 == "s2"));
    }
}
