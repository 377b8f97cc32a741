use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::warn;

use crate::error::SessionError;

/// Canonical UTC zone; bootstrap hands this out whenever the server reports `UTC`.
pub const UTC: Tz = Tz::UTC;

/// Structured server version. Parsing is lenient: missing or non-numeric parts read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl ServerVersion {
    #[must_use]
    pub fn parse(version: &str) -> Self {
        let mut parts = [0u32; 4];
        for (slot, part) in parts.iter_mut().zip(version.trim().split('.')) {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse() {
                Ok(n) => *slot = n,
                Err(_) => break,
            }
        }
        let [major, minor, patch, build] = parts;
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Whether this version is at least `major.minor`.
    #[must_use]
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl FromStr for ServerVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.build != 0 {
            write!(f, ".{}", self.build)?;
        }
        Ok(())
    }
}

/// Session-scoped facts negotiated once at connect time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProfile {
    pub server_time_zone: Tz,
    /// Zone used for client-side date/time conversion.
    pub effective_time_zone: Tz,
    pub server_version: ServerVersion,
    /// Database the server reported (or the configured one) when the session opened.
    pub database: String,
    pub user: String,
    /// Compliance mode.
    pub compliant: bool,
}

/// Resolve the zone reported by the server. Blank means UTC; unknown names fall back to UTC.
pub(crate) fn resolve_server_time_zone(name: &str) -> Tz {
    let name = name.trim();
    if name.is_empty() || name == "UTC" {
        return UTC;
    }
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(time_zone = name, "unknown server timezone, falling back to UTC");
        UTC
    })
}

/// Resolve an explicitly configured client zone.
pub(crate) fn resolve_client_time_zone(name: &str) -> Result<Tz, SessionError> {
    let name = name.trim();
    if name == "UTC" {
        return Ok(UTC);
    }
    name.parse::<Tz>()
        .map_err(|e| SessionError::Config(format!("Invalid timezone {name:?}: {e}")))
}
