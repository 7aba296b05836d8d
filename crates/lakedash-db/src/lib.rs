//! # lakedash-db
//!
//! Connection, credential and result-cache subsystem for the lakedash
//! dashboard. The presentation layer supplies a SQL string (and optional
//! named parameters) and gets back a materialized table or a descriptive
//! error; everything stateful lives here.
//!
//! ## Shape
//!
//! - [`Settings`] — typed configuration, loaded once and validated eagerly.
//! - [`driver`] — ODBC driver discovery and preference-order selection.
//! - [`ConnectionManager`] — owns the single cached connection handle;
//!   lazy, single-flight initialization; token-attach with native-auth
//!   fallback for the browser and device-code modes.
//! - [`QueryExecutor`] — runs SQL through the shared handle and caches
//!   results with a time-to-live.
//! - [`Connector`]/[`Connection`] — the seam to the actual ODBC binding;
//!   the embedding process provides it, tests use fakes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lakedash_db::{ConnectionManager, QueryExecutor, Settings};
//!
//! let settings = Settings::load()?;
//! let manager = Arc::new(ConnectionManager::new(settings, connector)?);
//! let executor = QueryExecutor::new(manager);
//!
//! let table = executor
//!     .run_query("SELECT serie, COUNT(*) AS qtd FROM dbo.tb_alunos GROUP BY serie", None)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connect;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod manager;
pub mod query;
pub mod rows;
pub mod server_address;
pub mod settings;
pub mod token_source;

pub use connect::{Connection, Connector, Handle, OpenError};
pub use descriptor::{
    CONNECT_TIMEOUT, ConnectRequest, ConnectionDescriptor, NativeAuthKeyword,
    SQL_COPT_SS_ACCESS_TOKEN,
};
pub use driver::{DriverDescriptor, PREFERRED_DRIVERS, installed_drivers, resolve_driver};
pub use error::Error;
pub use lakedash_auth::{AccessToken, AuthError};
pub use manager::ConnectionManager;
pub use query::{QueryCacheConfig, QueryExecutor, RESULT_TTL, query_key};
pub use rows::{Column, Params, Row, Table, Value};
pub use server_address::ServerAddress;
pub use settings::{AuthMode, Settings};
pub use token_source::{EntraTokenSource, PromptSink, TokenFlow, TokenSource, TracingPromptSink};
