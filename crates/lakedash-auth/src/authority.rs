//! Identity provider endpoint construction.

use url::Url;

use crate::error::AuthError;

/// Default issuer base for the Microsoft identity platform.
const DEFAULT_ISSUER_BASE: &str = "https://login.microsoftonline.com";

/// A tenant-scoped issuer authority.
///
/// Produces the v2.0 endpoint URLs the token flows talk to. The base can be
/// overridden, which also lets tests point a flow at a local stub server.
#[derive(Debug, Clone)]
pub struct Authority {
    base: Url,
    tenant_id: String,
}

impl Authority {
    /// Authority for a tenant under the public Microsoft identity platform.
    pub fn new(tenant_id: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_base(DEFAULT_ISSUER_BASE, tenant_id)
    }

    /// Authority under a custom issuer base (sovereign clouds, test stubs).
    pub fn with_base(base: &str, tenant_id: impl Into<String>) -> Result<Self, AuthError> {
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() {
            return Err(AuthError::Configuration(
                "tenant_id is required for token-based authentication".into(),
            ));
        }
        let base = Url::parse(base)
            .map_err(|e| AuthError::Configuration(format!("invalid issuer base {base}: {e}")))?;
        Ok(Self { base, tenant_id })
    }

    /// The tenant this authority is scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The v2.0 authorization endpoint.
    pub fn authorize_endpoint(&self) -> Result<Url, AuthError> {
        self.endpoint("authorize")
    }

    /// The v2.0 token endpoint.
    pub fn token_endpoint(&self) -> Result<Url, AuthError> {
        self.endpoint("token")
    }

    /// The v2.0 device authorization endpoint.
    pub fn device_code_endpoint(&self) -> Result<Url, AuthError> {
        self.endpoint("devicecode")
    }

    fn endpoint(&self, leaf: &str) -> Result<Url, AuthError> {
        self.base
            .join(&format!("{}/oauth2/v2.0/{leaf}", self.tenant_id))
            .map_err(|e| AuthError::Configuration(format!("invalid endpoint url: {e}")))
    }
}
