//! Parsing of identity provider token responses.
//!
//! Parsing is kept separate from the HTTP plumbing so the edge cases
//! (missing fields, declined consent, expired device codes) are testable
//! without a live provider.

use std::time::Duration;

use serde::Deserialize;

use crate::error::AuthError;
use crate::token::AccessToken;

/// Raw shape of a v2.0 token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponseBody {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Outcome of one token endpoint poll during the device-code flow.
#[derive(Debug)]
pub(crate) enum TokenPoll {
    /// The user completed authorization; the token was issued.
    Granted(AccessToken),
    /// Authorization is still pending; keep polling.
    Pending,
    /// The provider asked the client to back off.
    SlowDown,
}

/// Parse a device-flow token poll response.
pub(crate) fn parse_token_poll(body: &str) -> Result<TokenPoll, AuthError> {
    let parsed: TokenResponseBody = serde_json::from_str(body).map_err(|_| {
        AuthError::ProviderResponse {
            raw: body.to_string(),
        }
    })?;

    if let Some(token) = parsed.access_token {
        return Ok(TokenPoll::Granted(wrap_token(token, parsed.expires_in)));
    }

    match parsed.error.as_deref() {
        Some("authorization_pending") => Ok(TokenPoll::Pending),
        Some("slow_down") => Ok(TokenPoll::SlowDown),
        Some("authorization_declined") | Some("access_denied") => Err(AuthError::Declined {
            raw: body.to_string(),
        }),
        Some("expired_token") => Err(AuthError::DeviceCodeExpired {
            raw: body.to_string(),
        }),
        _ => Err(AuthError::ProviderResponse {
            raw: body.to_string(),
        }),
    }
}

/// Parse a one-shot token response (authorization-code exchange).
///
/// Any response without an access token is a failure carrying the raw body.
pub(crate) fn parse_token_grant(body: &str) -> Result<AccessToken, AuthError> {
    let parsed: TokenResponseBody = serde_json::from_str(body).map_err(|_| {
        AuthError::ProviderResponse {
            raw: body.to_string(),
        }
    })?;

    match parsed.access_token {
        Some(token) => Ok(wrap_token(token, parsed.expires_in)),
        None => Err(AuthError::ProviderResponse {
            raw: body.to_string(),
        }),
    }
}

fn wrap_token(secret: String, expires_in: Option<u64>) -> AccessToken {
    match expires_in {
        Some(secs) => AccessToken::with_expiry(secret, Duration::from_secs(secs)),
        None => AccessToken::new(secret),
    }
}
