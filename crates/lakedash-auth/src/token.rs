//! Access token representation.

use std::time::Duration;

/// An opaque bearer token for the SQL endpoint.
///
/// The token is consumed once per connection attempt and is never persisted.
/// `Debug` redacts the secret.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_in: Option<Duration>,
}

impl AccessToken {
    /// Wrap a bearer token returned by the identity provider.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
        }
    }

    /// Wrap a bearer token together with the provider's lifetime hint.
    pub fn with_expiry(secret: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_in: Some(expires_in),
        }
    }

    /// The raw token string.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Lifetime hint from the provider, if one was returned.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Encode the token for the ODBC access-token pre-connect attribute.
    ///
    /// The driver expects the token as UTF-16LE bytes (the same shape the
    /// `SQL_COPT_SS_ACCESS_TOKEN` attribute takes).
    #[must_use]
    pub fn odbc_bytes(&self) -> Vec<u8> {
        self.secret
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
