//! Identity-provider boundary.
//!
//! The daemon never verifies tokens itself; it forwards to an external
//! identity provider reached through this trait. Implementations must be
//! safe for concurrent use from many handler tasks, which the `Send + Sync`
//! bounds enforce. The real backend (Firebase Admin in the original
//! deployment) plugs in behind `IdentityProvider`; tests use canned fakes.

use async_trait::async_trait;
use thiserror::Error;

/// Sentinel provider id reported for profiles with no linked providers.
pub const ANONYMOUS_PROVIDER: &str = "anonymous";

/// Failures reported by the identity provider. All of these surface to the
/// client as an `err:` line, never as a handler crash.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid identity token: {0}")]
    InvalidToken(String),

    #[error("unknown user: {0}")]
    UserNotFound(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a successful token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub subject: String,
    pub provider: String,
}

/// A user profile as reported by the provider.
///
/// `provider_ids` lists the user's linked identity providers in provider
/// order; the wire response carries only the primary one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub email: String,
    pub photo_url: String,
    pub provider_ids: Vec<String>,
}

impl UserProfile {
    /// First linked provider, or the `"anonymous"` sentinel when the
    /// profile has none.
    pub fn primary_provider(&self) -> &str {
        self.provider_ids
            .first()
            .map(String::as_str)
            .unwrap_or(ANONYMOUS_PROVIDER)
    }
}

/// The external collaborator this daemon bridges to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an identity token, returning the subject it asserts.
    /// Token claims (expiry, audience) are entirely the provider's concern.
    async fn verify_id_token(&self, token: &str) -> Result<AuthResult, ProviderError>;

    /// Fetch the profile for a verified subject.
    async fn get_user_profile(&self, subject: &str) -> Result<UserProfile, ProviderError>;
}

/// Default backend used when no real provider has been wired in.
/// Keeps the daemon runnable: every request gets a descriptive `err:` line.
pub struct UnconfiguredProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredProvider {
    async fn verify_id_token(&self, _token: &str) -> Result<AuthResult, ProviderError> {
        Err(ProviderError::Unavailable(
            "no identity provider backend configured".into(),
        ))
    }

    async fn get_user_profile(&self, _subject: &str) -> Result<UserProfile, ProviderError> {
        Err(ProviderError::Unavailable(
            "no identity provider backend configured".into(),
        ))
    }
}
