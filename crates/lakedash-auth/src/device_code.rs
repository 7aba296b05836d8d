//! Device-code sign-in flow.
//!
//! The flow has two observable halves, so the caller can surface the
//! verification prompt before anything blocks:
//!
//! 1. [`DeviceCodeFlow::begin`] requests a device/user code pair and returns
//!    a [`PendingDeviceAuth`] carrying the [`DeviceCodePrompt`].
//! 2. [`PendingDeviceAuth::wait`] polls the token endpoint until the user
//!    authorizes, declines, or the provider's window lapses.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use crate::authority::Authority;
use crate::error::AuthError;
use crate::response::{TokenPoll, parse_token_poll};
use crate::token::AccessToken;
use crate::{DEVICE_CODE_GRANT, SQL_ENDPOINT_SCOPE};

/// Poll interval used when the provider does not suggest one.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Added to the poll interval after a `slow_down` response.
const SLOW_DOWN_BACKOFF: Duration = Duration::from_secs(5);

/// The user-facing half of a pending device-code sign-in.
///
/// Surface `verification_uri` and `user_code` to the operator before
/// awaiting the token.
#[derive(Debug, Clone)]
pub struct DeviceCodePrompt {
    /// Where the user signs in from a second device.
    pub verification_uri: String,
    /// The short code the user types at the verification page.
    pub user_code: String,
    /// The provider's ready-made instruction text.
    pub message: String,
}

/// Raw shape of a device authorization response.
#[derive(Debug, Deserialize)]
struct DeviceAuthorizationBody {
    user_code: Option<String>,
    device_code: Option<String>,
    verification_uri: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
    message: Option<String>,
}

/// Parsed, validated device authorization.
#[derive(Debug)]
struct DeviceAuthorization {
    prompt: DeviceCodePrompt,
    device_code: String,
    expires_in: Duration,
    interval: Duration,
}

/// A response without a user code means the flow never started; fail
/// immediately with the raw body, no blocking wait.
fn parse_device_authorization(body: &str) -> Result<DeviceAuthorization, AuthError> {
    let parsed: DeviceAuthorizationBody = serde_json::from_str(body).map_err(|_| {
        AuthError::ProviderResponse {
            raw: body.to_string(),
        }
    })?;

    let (Some(user_code), Some(device_code), Some(verification_uri)) = (
        parsed.user_code,
        parsed.device_code,
        parsed.verification_uri,
    ) else {
        return Err(AuthError::ProviderResponse {
            raw: body.to_string(),
        });
    };

    let message = parsed.message.unwrap_or_else(|| {
        format!("To sign in, open {verification_uri} and enter the code {user_code}.")
    });

    Ok(DeviceAuthorization {
        prompt: DeviceCodePrompt {
            verification_uri,
            user_code,
            message,
        },
        device_code,
        expires_in: Duration::from_secs(parsed.expires_in.unwrap_or(900)),
        interval: parsed
            .interval
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs),
    })
}

/// Device-code flow against a tenant authority.
#[derive(Debug, Clone)]
pub struct DeviceCodeFlow {
    http: reqwest::Client,
    authority: Authority,
    client_id: String,
}

impl DeviceCodeFlow {
    /// Create a flow for the given authority and public client.
    pub fn new(authority: Authority, client_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority,
            client_id: client_id.into(),
        }
    }

    /// Request a device/user code pair from the provider.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::ProviderResponse`] when the provider does not
    /// return a usable code pair; no waiting happens in that case.
    pub async fn begin(&self) -> Result<PendingDeviceAuth, AuthError> {
        let endpoint = self.authority.device_code_endpoint()?;
        tracing::debug!(tenant = self.authority.tenant_id(), "requesting device code");

        let body = self
            .http
            .post(endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", SQL_ENDPOINT_SCOPE),
            ])
            .send()
            .await?
            .text()
            .await?;

        let authorization = parse_device_authorization(&body)?;
        tracing::info!(
            verification_uri = %authorization.prompt.verification_uri,
            "device code issued"
        );

        Ok(PendingDeviceAuth {
            http: self.http.clone(),
            token_endpoint: self.authority.token_endpoint()?,
            client_id: self.client_id.clone(),
            authorization,
        })
    }
}

/// A device-code sign-in waiting for the user to authorize.
#[derive(Debug)]
pub struct PendingDeviceAuth {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    authorization: DeviceAuthorization,
}

impl PendingDeviceAuth {
    /// The prompt to surface to the operator before waiting.
    #[must_use]
    pub fn prompt(&self) -> &DeviceCodePrompt {
        &self.authorization.prompt
    }

    /// Block until the user authorizes the sign-in or the flow fails.
    ///
    /// Polls the token endpoint at the provider-suggested interval, backing
    /// off on `slow_down`. The provider's `expires_in` window is the upper
    /// bound; lapsing it is an error.
    pub async fn wait(self) -> Result<AccessToken, AuthError> {
        let deadline = Instant::now() + self.authorization.expires_in;
        let mut interval = self.authorization.interval;
        let mut last_body = String::new();

        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(AuthError::DeviceCodeExpired { raw: last_body });
            }

            let body = self
                .http
                .post(self.token_endpoint.clone())
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", self.authorization.device_code.as_str()),
                ])
                .send()
                .await?
                .text()
                .await?;

            match parse_token_poll(&body)? {
                TokenPoll::Granted(token) => {
                    tracing::info!("device code authorization completed");
                    return Ok(token);
                }
                TokenPoll::Pending => {
                    tracing::trace!("device code authorization pending");
                }
                TokenPoll::SlowDown => {
                    interval += SLOW_DOWN_BACKOFF;
                    tracing::debug!(interval_secs = interval.as_secs(), "provider asked to slow down");
                }
            }
            last_body = body;
        }
    }
}
