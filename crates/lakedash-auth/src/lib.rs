//! # lakedash-auth
//!
//! Entra ID token acquisition for the lakedash SQL endpoint.
//!
//! Two user-facing flows are provided, both scoped to the database
//! resource's default scope:
//!
//! - [`InteractiveFlow`] — authorization-code flow with PKCE. The flow hands
//!   back the authorization URL; the caller opens it in a browser and the
//!   flow blocks on a loopback redirect listener until consent completes.
//! - [`DeviceCodeFlow`] — device-code flow. The flow surfaces a
//!   [`DeviceCodePrompt`] (verification URL + short code) before blocking on
//!   token polling.
//!
//! Service-principal sign-in deliberately has no flow here: the client
//! id/secret pair is embedded directly in the connection descriptor by the
//! connection layer, using the driver's native service-principal keyword.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lakedash_auth::{Authority, DeviceCodeFlow, DEFAULT_PUBLIC_CLIENT_ID};
//!
//! let authority = Authority::new("my-tenant-id")?;
//! let flow = DeviceCodeFlow::new(authority, DEFAULT_PUBLIC_CLIENT_ID);
//! let pending = flow.begin().await?;
//! println!("{}", pending.prompt().message);
//! let token = pending.wait().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod authority;
pub mod device_code;
pub mod error;
pub mod interactive;
pub mod pkce;
mod response;
pub mod token;

pub use authority::Authority;
pub use device_code::{DeviceCodeFlow, DeviceCodePrompt, PendingDeviceAuth};
pub use error::AuthError;
pub use interactive::{InteractiveFlow, PendingInteractiveAuth};
pub use pkce::PkcePair;
pub use token::AccessToken;

/// Default scope for the SQL endpoint resource.
///
/// The resource URI ends with a slash, so the `/.default` suffix produces a
/// double slash; the identity provider requires the literal form.
pub const SQL_ENDPOINT_SCOPE: &str = "https://database.windows.net//.default";

/// Well-known public client id used when the configuration supplies none
/// (the Azure CLI first-party application).
pub const DEFAULT_PUBLIC_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Grant type for device-code token polling.
pub(crate) const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
