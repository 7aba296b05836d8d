//! The process-wide connection owner.
//!
//! [`ConnectionManager`] is constructed once at process start and injected
//! into callers. The handle is created lazily on first use with
//! single-flight semantics (a `tokio` `OnceCell`): exactly one caller opens
//! the connection, concurrent first-callers await it, and every later call
//! returns the cached handle without redoing authentication or I/O. A
//! failed initialization is not cached; the next caller retries. A handle
//! that breaks mid-life is not detected or replaced.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::connect::{Connector, Handle, OpenError};
use crate::descriptor::{ConnectRequest, ConnectionDescriptor, NativeAuthKeyword};
use crate::driver::{installed_drivers, resolve_driver};
use crate::error::Error;
use crate::server_address::ServerAddress;
use crate::settings::{AuthMode, Settings};
use crate::token_source::{EntraTokenSource, TokenFlow, TokenSource};

/// Owns the single cached connection handle.
pub struct ConnectionManager {
    settings: Settings,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenSource>,
    drivers: Vec<String>,
    handle: OnceCell<Handle>,
}

impl ConnectionManager {
    /// Create a manager over validated settings and a driver binding.
    ///
    /// Probes the host for installed ODBC drivers; token-based modes get an
    /// Entra token source for the configured tenant.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when the settings are invalid for their
    /// auth mode.
    pub fn new(settings: Settings, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        settings.validate()?;
        let tokens: Arc<dyn TokenSource> = Arc::new(EntraTokenSource::new(
            settings.tenant_id.clone().unwrap_or_default(),
            settings.client_id.clone(),
        ));
        Ok(Self {
            settings,
            connector,
            tokens,
            drivers: installed_drivers(),
            handle: OnceCell::new(),
        })
    }

    /// Replace the token source (tests, custom prompt routing).
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replace the probed driver list with a fixed one.
    #[must_use]
    pub fn with_installed_drivers(mut self, drivers: Vec<String>) -> Self {
        self.drivers = drivers;
        self
    }

    /// The settings this manager was built with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the shared connection handle, opening it on first use.
    ///
    /// Single-flight: under concurrent first use exactly one caller runs
    /// the open; all callers observe the same handle.
    pub async fn get_connection(&self) -> Result<Handle, Error> {
        self.handle
            .get_or_try_init(|| self.connect())
            .await
            .map(Arc::clone)
    }

    async fn connect(&self) -> Result<Handle, Error> {
        let server = ServerAddress::normalize(&self.settings.server);
        let driver = resolve_driver(&self.drivers)?;
        let descriptor = ConnectionDescriptor::new(
            driver,
            server,
            self.settings.database.clone(),
            self.settings.trust_server_certificate,
        );

        match self.settings.auth_mode {
            AuthMode::ServicePrincipal => self.connect_service_principal(&descriptor).await,
            AuthMode::Interactive => {
                self.connect_with_token(
                    &descriptor,
                    TokenFlow::Interactive,
                    NativeAuthKeyword::Interactive,
                )
                .await
            }
            AuthMode::DeviceCode => {
                self.connect_with_token(
                    &descriptor,
                    TokenFlow::DeviceCode,
                    NativeAuthKeyword::DeviceCode,
                )
                .await
            }
        }
    }

    async fn connect_service_principal(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Handle, Error> {
        let client_id = self.settings.client_id.as_deref().unwrap_or_default();
        let client_secret = self.settings.client_secret.as_deref().unwrap_or_default();
        let request =
            descriptor.service_principal(client_id, client_secret, self.settings.tenant_id.as_deref());

        tracing::debug!(
            driver = descriptor.driver().name(),
            server = %descriptor.server(),
            "opening connection with service principal"
        );
        match self.open(&request).await {
            Ok(handle) => {
                tracing::info!(server = %descriptor.server(), "connection established");
                Ok(handle)
            }
            Err(cause) => Err(connection_error(
                descriptor,
                format!(
                    "service principal sign-in via ODBC failed: {cause}\n\
                     hints:\n\
                     - confirm client_id/client_secret/tenant_id of the app registration (Entra ID)\n\
                     - the service principal needs access to the workspace/SQL endpoint\n\
                     - set trust_server_certificate=true temporarily to diagnose TLS, then remove it"
                ),
            )),
        }
    }

    async fn connect_with_token(
        &self,
        descriptor: &ConnectionDescriptor,
        flow: TokenFlow,
        keyword: NativeAuthKeyword,
    ) -> Result<Handle, Error> {
        let token = self.tokens.acquire(flow).await?;

        tracing::debug!(
            driver = descriptor.driver().name(),
            server = %descriptor.server(),
            ?flow,
            "opening connection with attached access token"
        );
        let primary = descriptor.token_attach(token);
        let primary_err = match self.open(&primary).await {
            Ok(handle) => {
                tracing::info!(server = %descriptor.server(), "connection established");
                return Ok(handle);
            }
            Err(err) => err,
        };

        // Some driver/environment combinations reject manually attached
        // tokens; retry once with the driver's own flow keyword.
        tracing::warn!(
            error = %primary_err,
            keyword = keyword.as_str(),
            "token attach failed; falling back to the driver's native authentication"
        );
        let fallback = descriptor.native_auth(keyword);
        match self.open(&fallback).await {
            Ok(handle) => {
                tracing::info!(server = %descriptor.server(), "connection established via fallback");
                Ok(handle)
            }
            Err(fallback_err) => Err(connection_error(
                descriptor,
                format!(
                    "both the access-token attach and the driver's native fallback failed\n\
                     attempts: access token via pre-connect attribute 1256, then Authentication={}\n\
                     token attach error: {primary_err}\n\
                     native fallback error: {fallback_err}\n\
                     hints:\n\
                     - confirm the server format (tcp:host,1433)\n\
                     - install the ODBC Driver 18 (x64) for best token compatibility\n\
                     - set trust_server_certificate=true temporarily to diagnose TLS, then remove it",
                    keyword.as_str()
                ),
            )),
        }
    }

    async fn open(&self, request: &ConnectRequest) -> Result<Handle, OpenError> {
        match tokio::time::timeout(request.timeout(), self.connector.open(request)).await {
            Ok(result) => result,
            Err(_) => Err(OpenError(format!(
                "connection open timed out after {}s",
                request.timeout().as_secs()
            ))),
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("auth_mode", &self.settings.auth_mode)
            .field("connected", &self.handle.initialized())
            .finish_non_exhaustive()
    }
}

fn connection_error(descriptor: &ConnectionDescriptor, detail: String) -> Error {
    Error::Connection {
        driver: descriptor.driver().name().to_string(),
        server: descriptor.server().to_string(),
        database: descriptor.database().to_string(),
        detail,
    }
}
