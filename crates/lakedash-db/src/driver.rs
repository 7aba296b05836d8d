//! ODBC driver discovery and selection.
//!
//! Selection is pure over a list of installed driver names; the environment
//! probe enumerates the sections of `odbcinst.ini` the way unixODBC
//! registers drivers. Tests inject fixed installed lists.

use std::path::{Path, PathBuf};

use crate::error::Error;

/// Supported drivers, most capable/modern first.
pub const PREFERRED_DRIVERS: [&str; 4] = [
    "ODBC Driver 18 for SQL Server",
    "ODBC Driver 17 for SQL Server",
    "SQL Server Native Client 11.0",
    "SQL Server",
];

/// The ODBC driver chosen for connection strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverDescriptor {
    name: String,
}

impl DriverDescriptor {
    /// The driver name as it appears in `Driver={...}`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for DriverDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Select the best installed driver by fixed preference order.
///
/// # Errors
///
/// [`Error::Configuration`] when none of the preferred drivers is installed;
/// the message includes the full installed set to aid diagnosis.
pub fn resolve_driver(installed: &[String]) -> Result<DriverDescriptor, Error> {
    for preferred in PREFERRED_DRIVERS {
        if installed.iter().any(|name| name == preferred) {
            tracing::debug!(driver = preferred, "selected ODBC driver");
            return Ok(DriverDescriptor {
                name: preferred.to_string(),
            });
        }
    }
    Err(Error::Configuration(format!(
        "no SQL Server ODBC driver found; installed drivers: {installed:?}; \
         install the Microsoft ODBC Driver 18 for SQL Server (x64), or 17"
    )))
}

/// Enumerate the ODBC drivers registered on this host.
///
/// Reads the first of `$ODBCINSTINI`, `$ODBCSYSINI/odbcinst.ini`,
/// `/etc/odbcinst.ini` that exists. Absence of all of them reads as an
/// empty installed set.
#[must_use]
pub fn installed_drivers() -> Vec<String> {
    for path in candidate_ini_paths() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            tracing::trace!(path = %path.display(), "probing odbcinst.ini");
            return parse_odbcinst(&content);
        }
    }
    Vec::new()
}

fn candidate_ini_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(inst) = std::env::var("ODBCINSTINI") {
        paths.push(PathBuf::from(inst));
    }
    if let Ok(sysini) = std::env::var("ODBCSYSINI") {
        paths.push(Path::new(&sysini).join("odbcinst.ini"));
    }
    paths.push(PathBuf::from("/etc/odbcinst.ini"));
    paths
}

/// Driver names are the section headers; the `[ODBC]` and `[ODBC Drivers]`
/// bookkeeping sections are not drivers.
fn parse_odbcinst(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let section = line.strip_prefix('[')?.strip_suffix(']')?.trim();
            if section.is_empty() || section == "ODBC" || section == "ODBC Drivers" {
                None
            } else {
                Some(section.to_string())
            }
        })
        .collect()
}
