//! Health status value type
//!
//! Every check (built-in or scripted) produces a [`HealthStatus`].
//! The variant order of [`HealthStatusCode`] is the severity order used
//! by aggregation: `Healthy < Suspended < Progressing < Missing < Degraded < Unknown`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated health of a resource
///
/// Declaration order matters: the derived `Ord` is the aggregation order,
/// best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthStatusCode {
    Healthy,
    Suspended,
    Progressing,
    Missing,
    Degraded,
    Unknown,
}

impl HealthStatusCode {
    /// All codes, best to worst
    pub const ALL: [HealthStatusCode; 6] = [
        HealthStatusCode::Healthy,
        HealthStatusCode::Suspended,
        HealthStatusCode::Progressing,
        HealthStatusCode::Missing,
        HealthStatusCode::Degraded,
        HealthStatusCode::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatusCode::Healthy => "Healthy",
            HealthStatusCode::Suspended => "Suspended",
            HealthStatusCode::Progressing => "Progressing",
            HealthStatusCode::Missing => "Missing",
            HealthStatusCode::Degraded => "Degraded",
            HealthStatusCode::Unknown => "Unknown",
        }
    }

    /// Returns true if `self` ranks strictly worse than `other`
    pub fn is_worse(&self, other: HealthStatusCode) -> bool {
        *self > other
    }
}

impl fmt::Display for HealthStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the enumerated status literals
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown health status literal {0:?}")]
pub struct UnknownStatusLiteral(pub String);

impl FromStr for HealthStatusCode {
    type Err = UnknownStatusLiteral;

    /// Parse an exact, case-sensitive status literal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HealthStatusCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownStatusLiteral(s.to_string()))
    }
}

/// Result of a health check: a status code plus a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthStatusCode,

    /// Free-text explanation, empty when there is nothing to say
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    pub fn new(status: HealthStatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Healthy, message)
    }

    pub fn suspended(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Suspended, message)
    }

    pub fn progressing(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Progressing, message)
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Missing, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Degraded, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(HealthStatusCode::Unknown, message)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{}: {}", self.status, self.message)
        }
    }
}
