//! Server address normalization.

/// Default SQL endpoint port.
pub const DEFAULT_PORT: u16 = 1433;

/// A server address normalized to `tcp:<host>,<port>` form.
///
/// Pure function of the configured `server` value; recomputed on each
/// connection attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress(String);

impl ServerAddress {
    /// Normalize a configured server value.
    ///
    /// Ensures the `tcp:` transport prefix and an explicit port, defaulting
    /// to 1433. Never double-prefixes or double-ports.
    #[must_use]
    pub fn normalize(server: &str) -> Self {
        let trimmed = server.trim();
        let prefixed = if trimmed.to_ascii_lowercase().starts_with("tcp:") {
            trimmed.to_string()
        } else {
            format!("tcp:{trimmed}")
        };
        let with_port = if prefixed.contains(',') {
            prefixed
        } else {
            format!("{prefixed},{DEFAULT_PORT}")
        };
        Self(with_port)
    }

    /// The normalized address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
