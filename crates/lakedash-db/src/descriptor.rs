//! ODBC connection descriptors.
//!
//! A [`ConnectionDescriptor`] carries the driver, normalized server,
//! database and TLS flags; it renders the concrete [`ConnectRequest`] for
//! each authentication shape:
//!
//! - service principal: native `Authentication=ActiveDirectoryServicePrincipal`
//!   with `UID`/`PWD` embedded (and `Authority Id` when a tenant is set);
//! - token attach: no identity in the string, the bearer token rides the
//!   `SQL_COPT_SS_ACCESS_TOKEN` pre-connect attribute;
//! - native fallback: the driver's own keyword for the interactive or
//!   device-code flow, no manual token.

use std::time::Duration;

use lakedash_auth::AccessToken;

use crate::driver::DriverDescriptor;
use crate::server_address::ServerAddress;

/// ODBC pre-connect attribute id for an Entra access token.
pub const SQL_COPT_SS_ACCESS_TOKEN: u16 = 1256;

/// Bound on a single connection open.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Driver-native authentication keywords for the token-based flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeAuthKeyword {
    /// `Authentication=ActiveDirectoryInteractive`.
    Interactive,
    /// `Authentication=ActiveDirectoryDeviceCode`.
    DeviceCode,
}

impl NativeAuthKeyword {
    /// The keyword value as the driver expects it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "ActiveDirectoryInteractive",
            Self::DeviceCode => "ActiveDirectoryDeviceCode",
        }
    }
}

/// The endpoint-shaped half of a connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    driver: DriverDescriptor,
    server: ServerAddress,
    database: String,
    trust_server_certificate: bool,
}

impl ConnectionDescriptor {
    /// Build a descriptor for the given endpoint.
    pub fn new(
        driver: DriverDescriptor,
        server: ServerAddress,
        database: impl Into<String>,
        trust_server_certificate: bool,
    ) -> Self {
        Self {
            driver,
            server,
            database: database.into(),
            trust_server_certificate,
        }
    }

    /// The selected driver.
    #[must_use]
    pub fn driver(&self) -> &DriverDescriptor {
        &self.driver
    }

    /// The normalized server address.
    #[must_use]
    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// The target database.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    fn prefix(&self) -> String {
        format!(
            "Driver={{{}}};Server={};Database={};Encrypt=yes;TrustServerCertificate={};",
            self.driver.name(),
            self.server,
            self.database,
            if self.trust_server_certificate { "yes" } else { "no" },
        )
    }

    /// Request embedding service-principal identity via the driver's native
    /// keyword. No out-of-band credential acquisition is involved.
    pub fn service_principal(
        &self,
        client_id: &str,
        client_secret: &str,
        tenant_id: Option<&str>,
    ) -> ConnectRequest {
        let mut conn_str = format!(
            "{}Authentication=ActiveDirectoryServicePrincipal;UID={client_id};PWD={client_secret};",
            self.prefix()
        );
        // Some environments require the tenant spelled out.
        if let Some(tenant) = tenant_id.filter(|t| !t.is_empty()) {
            conn_str.push_str(&format!("Authority Id={tenant};"));
        }
        ConnectRequest {
            connection_string: conn_str,
            access_token: None,
            timeout: CONNECT_TIMEOUT,
        }
    }

    fn token_base(&self) -> String {
        format!("{}Connection Timeout=30;", self.prefix())
    }

    /// Request carrying a pre-acquired token as the 1256 attribute; the
    /// connection string itself has no identity.
    pub fn token_attach(&self, token: AccessToken) -> ConnectRequest {
        ConnectRequest {
            connection_string: self.token_base(),
            access_token: Some(token),
            timeout: CONNECT_TIMEOUT,
        }
    }

    /// Fallback request using the driver's native keyword for the flow,
    /// without a manually supplied token.
    pub fn native_auth(&self, keyword: NativeAuthKeyword) -> ConnectRequest {
        ConnectRequest {
            connection_string: format!("{}Authentication={};", self.token_base(), keyword.as_str()),
            access_token: None,
            timeout: CONNECT_TIMEOUT,
        }
    }
}

/// One concrete connection attempt handed to a
/// [`Connector`](crate::connect::Connector).
#[derive(Clone)]
pub struct ConnectRequest {
    connection_string: String,
    access_token: Option<AccessToken>,
    timeout: Duration,
}

impl ConnectRequest {
    /// The full ODBC connection string, secrets included.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// The token for the `SQL_COPT_SS_ACCESS_TOKEN` attribute, if this is a
    /// token-attach attempt. Encode with [`AccessToken::odbc_bytes`].
    #[must_use]
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Upper bound for the open.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The connection string with secret material masked, for logs and
    /// error text.
    #[must_use]
    pub fn redacted(&self) -> String {
        self.connection_string
            .split(';')
            .map(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                if key.eq_ignore_ascii_case("pwd") || key.eq_ignore_ascii_case("password") {
                    format!("{key}=[REDACTED]")
                } else {
                    pair.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("connection_string", &self.redacted())
            .field("access_token", &self.access_token)
            .field("timeout", &self.timeout)
            .finish()
    }
}
