//! Credential acquisition seam for the token-based auth modes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lakedash_auth::{
    AccessToken, AuthError, Authority, DEFAULT_PUBLIC_CLIENT_ID, DeviceCodeFlow, DeviceCodePrompt,
    InteractiveFlow,
};
use url::Url;

/// The two flows that produce an out-of-band access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFlow {
    /// Interactive browser consent.
    Interactive,
    /// Device-code sign-in from a second device.
    DeviceCode,
}

/// Where user-facing sign-in prompts go.
///
/// The presentation layer is an external collaborator; it implements this to
/// render prompts however it likes. The default sink logs them.
pub trait PromptSink: Send + Sync {
    /// The interactive flow produced an authorization URL the operator's
    /// browser must visit.
    fn browser_consent(&self, authorize_url: &Url);

    /// The device-code flow issued a verification URL and short code; must
    /// be surfaced before the flow blocks on polling.
    fn device_code(&self, prompt: &DeviceCodePrompt);
}

/// Prompt sink that emits prompts through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPromptSink;

impl PromptSink for TracingPromptSink {
    fn browser_consent(&self, authorize_url: &Url) {
        tracing::info!(url = %authorize_url, "open this URL in a browser to sign in");
    }

    fn device_code(&self, prompt: &DeviceCodePrompt) {
        tracing::info!(
            verification_uri = %prompt.verification_uri,
            user_code = %prompt.user_code,
            "{}",
            prompt.message
        );
    }
}

/// Acquires access tokens for the token-based auth modes.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Run the given flow to completion and return the token.
    async fn acquire(&self, flow: TokenFlow) -> Result<AccessToken, AuthError>;
}

/// Token source backed by the Entra ID flows in `lakedash-auth`.
pub struct EntraTokenSource {
    tenant_id: String,
    client_id: String,
    prompts: Arc<dyn PromptSink>,
    consent_timeout: Option<Duration>,
}

impl EntraTokenSource {
    /// Create a source for the given tenant.
    ///
    /// `client_id` falls back to the well-known Azure CLI public client when
    /// the configuration supplies none.
    pub fn new(tenant_id: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PUBLIC_CLIENT_ID.to_string()),
            prompts: Arc::new(TracingPromptSink),
            consent_timeout: None,
        }
    }

    /// Route prompts somewhere other than the log.
    #[must_use]
    pub fn prompts(mut self, sink: Arc<dyn PromptSink>) -> Self {
        self.prompts = sink;
        self
    }

    /// Override the interactive consent upper bound.
    #[must_use]
    pub fn consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for EntraTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntraTokenSource")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for EntraTokenSource {
    async fn acquire(&self, flow: TokenFlow) -> Result<AccessToken, AuthError> {
        let authority = Authority::new(self.tenant_id.clone())?;
        match flow {
            TokenFlow::Interactive => {
                let mut interactive = InteractiveFlow::new(authority, self.client_id.clone());
                if let Some(timeout) = self.consent_timeout {
                    interactive = interactive.consent_timeout(timeout);
                }
                let pending = interactive.begin().await?;
                self.prompts.browser_consent(pending.authorize_url());
                pending.wait().await
            }
            TokenFlow::DeviceCode => {
                let pending = DeviceCodeFlow::new(authority, self.client_id.clone())
                    .begin()
                    .await?;
                self.prompts.device_code(pending.prompt());
                pending.wait().await
            }
        }
    }
}
