//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while acquiring an access token.
///
/// Provider-shaped failures carry the raw provider response so an operator
/// can diagnose the flow without digging through logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider returned a response the flow could not use.
    ///
    /// Carries the raw response body for diagnosis.
    #[error("identity provider returned no usable token: {raw}")]
    ProviderResponse {
        /// The raw provider response body.
        raw: String,
    },

    /// The user declined the consent prompt.
    #[error("authorization was declined: {raw}")]
    Declined {
        /// The raw provider response (error + description).
        raw: String,
    },

    /// The flow did not complete within its upper bound.
    #[error("authentication flow timed out after {seconds}s")]
    Timeout {
        /// Upper bound that elapsed, in seconds.
        seconds: u64,
    },

    /// The device code expired before the user authorized the sign-in.
    #[error("device code expired before authorization completed: {raw}")]
    DeviceCodeExpired {
        /// The last raw provider response observed while polling.
        raw: String,
    },

    /// The redirect received on the loopback listener was malformed or
    /// carried an unexpected state value.
    #[error("invalid authorization redirect: {0}")]
    InvalidRedirect(String),

    /// Network error while talking to the identity provider.
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O error (loopback redirect listener).
    #[error("loopback listener error: {0}")]
    Io(#[from] std::io::Error),

    /// The flow was configured with unusable inputs.
    #[error("authentication configuration error: {0}")]
    Configuration(String),
}
