//! The seam to the underlying ODBC driver manager.
//!
//! The subsystem builds connection descriptors and owns the fallback and
//! caching policy; the actual open/execute is behind [`Connector`] and
//! [`Connection`] so the embedding process supplies the driver binding and
//! tests supply fakes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::ConnectRequest;
use crate::error::Error;
use crate::rows::{Params, Table};

/// A shared, authenticated session to the database.
///
/// One handle serves all callers for the process lifetime; implementations
/// must be safe to execute from concurrent tasks.
#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Execute a statement and materialize the full result set.
    ///
    /// # Errors
    ///
    /// [`Error::Query`] on execution failure; propagated to the caller
    /// unchanged.
    async fn execute(&self, sql: &str, params: Option<&Params>) -> Result<Table, Error>;
}

/// The process-wide shared connection handle.
pub type Handle = Arc<dyn Connection>;

/// Failure of a single open attempt.
///
/// Attempt-level failures carry only their own description; the connection
/// manager combines them with endpoint context and remediation hints.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct OpenError(pub String);

/// Opens connections from rendered connect requests.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt to open a connection.
    async fn open(&self, request: &ConnectRequest) -> Result<Handle, OpenError>;
}
