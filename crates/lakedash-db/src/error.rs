//! Error taxonomy for the connection subsystem.

use thiserror::Error;

/// Errors surfaced by the connection and query layer.
///
/// Every variant carries enough context for an operator to self-diagnose
/// without reading logs: driver name, normalized server, database, and
/// which authentication flow was attempted.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing settings: unknown `auth_mode`, no usable ODBC
    /// driver (message lists the installed set), missing required fields.
    ///
    /// Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The identity provider flow did not yield a token.
    ///
    /// The raw provider response rides in the source error. Never retried.
    #[error("authentication failed: {0}")]
    Auth(#[from] lakedash_auth::AuthError),

    /// The endpoint could not be reached or authenticated, including after
    /// the documented native-auth fallback where one applies.
    ///
    /// `detail` combines the per-attempt failures and remediation hints.
    #[error("failed to connect to {server}/{database} with driver {driver}\n{detail}")]
    Connection {
        /// The resolved ODBC driver name.
        driver: String,
        /// The normalized server address.
        server: String,
        /// The target database.
        database: String,
        /// Attempt-by-attempt failure text plus remediation hints.
        detail: String,
    },

    /// SQL execution failed. Propagated unchanged; no retry, no partial
    /// result.
    #[error("query failed: {0}")]
    Query(String),
}

impl Error {
    /// True for settings problems that no retry can fix.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// True when the failure happened while opening the connection.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
