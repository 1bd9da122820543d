use super::ConfigError;
use std::time::Duration;

/// Default wall-clock budget for one script run
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default VM instruction budget for one script run
pub const DEFAULT_MAX_INSTRUCTIONS: u64 = 50_000_000;

/// Default interpreter heap limit in bytes (32 MiB)
pub const DEFAULT_MEMORY_LIMIT: usize = 32 * 1024 * 1024;

/// Resource bounds applied to every scripted health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub timeout: Duration,
    pub max_instructions: u64,
    pub memory_limit: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl ScriptLimits {
    /// Create limits from environment variables
    ///
    /// Uses:
    /// - `KUBEHEALTH_SCRIPT_TIMEOUT_MS` (default 500)
    /// - `KUBEHEALTH_SCRIPT_MAX_INSTRUCTIONS` (default 50000000)
    /// - `KUBEHEALTH_SCRIPT_MEMORY_LIMIT` in bytes (default 33554432)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ScriptLimits::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout = match parse_positive(&lookup, "KUBEHEALTH_SCRIPT_TIMEOUT_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.timeout,
        };
        let max_instructions = parse_positive(&lookup, "KUBEHEALTH_SCRIPT_MAX_INSTRUCTIONS")?
            .unwrap_or(defaults.max_instructions);
        let memory_limit = match parse_positive(&lookup, "KUBEHEALTH_SCRIPT_MEMORY_LIMIT")? {
            Some(bytes) => usize::try_from(bytes).map_err(|e| ConfigError::InvalidLimit {
                name: "KUBEHEALTH_SCRIPT_MEMORY_LIMIT".to_string(),
                value: bytes.to_string(),
                reason: e.to_string(),
            })?,
            None => defaults.memory_limit,
        };

        Ok(Self {
            timeout,
            max_instructions,
            memory_limit,
        })
    }
}

fn parse_positive<F>(lookup: &F, name: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::InvalidLimit {
        name: name.to_string(),
        value: raw.clone(),
        reason,
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(invalid(e.to_string())),
    }
}
