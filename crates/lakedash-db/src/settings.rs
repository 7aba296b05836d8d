//! Typed dashboard settings.
//!
//! Settings are read once at process start — from an optional `secrets.toml`
//! merged with `LAKEDASH_*` environment variables — and validated eagerly so
//! configuration errors surface before any connection attempt.

use serde::Deserialize;
use std::str::FromStr;

use crate::error::Error;

/// Which credential path the connection manager takes.
///
/// Fully determines the authentication flow; unknown values are rejected at
/// load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AuthMode {
    /// Service principal: client id/secret embedded in the connection
    /// descriptor via the driver's native keyword. The default.
    #[serde(rename = "spn")]
    ServicePrincipal,
    /// Interactive browser sign-in (accepted spellings: `browser`,
    /// `interactive`).
    #[serde(rename = "interactive", alias = "browser")]
    Interactive,
    /// Device-code sign-in.
    #[serde(rename = "devicecode")]
    DeviceCode,
}

impl AuthMode {
    /// True for the modes that acquire an out-of-band access token.
    #[must_use]
    pub fn uses_access_token(&self) -> bool {
        !matches!(self, Self::ServicePrincipal)
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spn" => Ok(Self::ServicePrincipal),
            "browser" | "interactive" => Ok(Self::Interactive),
            "devicecode" => Ok(Self::DeviceCode),
            other => Err(Error::Configuration(format!(
                "invalid auth_mode {other:?}; use \"spn\", \"browser\" (interactive) or \"devicecode\""
            ))),
        }
    }
}

fn default_auth_mode() -> AuthMode {
    AuthMode::ServicePrincipal
}

/// Immutable configuration, supplied once at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQL endpoint host, optionally `host,port`.
    pub server: String,
    /// Target database.
    pub database: String,
    /// Credential path (default: `spn`).
    #[serde(default = "default_auth_mode")]
    pub auth_mode: AuthMode,
    /// Entra tenant id. Required for the token-based modes.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Application (client) id. Required for `spn`; token-based modes fall
    /// back to the well-known Azure CLI public client.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret. Required for `spn` only.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Skip TLS certificate validation at the endpoint (default: false).
    #[serde(default)]
    pub trust_server_certificate: bool,
}

impl Settings {
    /// Load settings from `secrets.toml` (optional) plus `LAKEDASH_*`
    /// environment overrides, then validate.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] on unreadable sources, unknown `auth_mode`
    /// values, or missing required fields for the selected mode.
    pub fn load() -> Result<Self, Error> {
        Self::load_from("secrets")
    }

    /// Load from a specific config file base name (without extension).
    pub fn load_from(file: &str) -> Result<Self, Error> {
        let settings: Self = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("LAKEDASH"))
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Construct settings directly (tests, embedding callers).
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            auth_mode: AuthMode::ServicePrincipal,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            trust_server_certificate: false,
        }
    }

    /// Set the credential path.
    #[must_use]
    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    /// Set the tenant id.
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the client id.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the client secret.
    #[must_use]
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Skip TLS certificate validation (diagnosis only).
    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// Check that every field the selected mode needs is present.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the missing field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.trim().is_empty() {
            return Err(Error::Configuration("server must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(Error::Configuration("database must not be empty".into()));
        }
        match self.auth_mode {
            AuthMode::ServicePrincipal => {
                if !is_present(&self.client_id) {
                    return Err(Error::Configuration(
                        "auth_mode \"spn\" requires client_id".into(),
                    ));
                }
                if !is_present(&self.client_secret) {
                    return Err(Error::Configuration(
                        "auth_mode \"spn\" requires client_secret".into(),
                    ));
                }
            }
            AuthMode::Interactive | AuthMode::DeviceCode => {
                if !is_present(&self.tenant_id) {
                    return Err(Error::Configuration(
                        "token-based auth modes require tenant_id".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn is_present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ServicePrincipal => "spn",
            Self::Interactive => "interactive",
            Self::DeviceCode => "devicecode",
        };
        f.write_str(name)
    }
}
