//! Health check configuration
//!
//! [`HealthConfig`] is an immutable snapshot of the user's health
//! customizations, built once from ConfigMap data. Reloading means building
//! a new snapshot and swapping it in (callers typically hold it in an `Arc`);
//! nothing mutates a snapshot that an evaluation may be reading.
//!
//! Two representations are accepted:
//! - flat keys `resource.customizations.health.<group>_<kind>` (script) and
//!   `resource.customizations.useOpenLibs.<group>_<kind>` (bool)
//! - the nested `resource.customizations` YAML document, keyed by
//!   `<group-pattern>/<kind-pattern>`, which is the only place `*` globs work

mod limits;

pub use limits::{
    ScriptLimits, DEFAULT_MAX_INSTRUCTIONS, DEFAULT_MEMORY_LIMIT, DEFAULT_SCRIPT_TIMEOUT,
};

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const HEALTH_KEY_PREFIX: &str = "resource.customizations.health.";
pub const OPEN_LIBS_KEY_PREFIX: &str = "resource.customizations.useOpenLibs.";
pub const CUSTOMIZATIONS_KEY: &str = "resource.customizations";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse resource.customizations: {0}")]
    Customizations(#[from] serde_yaml::Error),

    #[error("invalid boolean {value:?} for {key}")]
    InvalidBool { key: String, value: String },

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidLimit {
        name: String,
        value: String,
        reason: String,
    },
}

/// A script entry from the nested configuration, possibly wildcarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOverride {
    pub group_pattern: String,
    pub kind_pattern: String,
    pub script: String,
    pub use_open_libs: bool,
}

impl ScriptOverride {
    pub fn new(
        group_pattern: impl Into<String>,
        kind_pattern: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            group_pattern: group_pattern.into(),
            kind_pattern: kind_pattern.into(),
            script: script.into(),
            use_open_libs: false,
        }
    }

    pub fn with_open_libs(mut self, use_open_libs: bool) -> Self {
        self.use_open_libs = use_open_libs;
        self
    }

    /// The configuration key this entry came from, `<group>/<kind>`
    pub fn pattern(&self) -> String {
        format!("{}/{}", self.group_pattern, self.kind_pattern)
    }
}

/// One entry of the nested `resource.customizations` document
#[derive(Debug, Deserialize)]
struct CustomizationEntry {
    #[serde(rename = "health.lua", default)]
    health_lua: Option<String>,

    #[serde(rename = "health.lua.useOpenLibs", default)]
    use_open_libs: bool,
}

/// Immutable snapshot of health customizations
#[derive(Debug, Clone, Default)]
pub struct HealthConfig {
    /// `<group>_<kind>` -> script source
    scripts: BTreeMap<String, String>,
    /// `<group>_<kind>` -> open libraries flag
    open_libs: BTreeMap<String, bool>,
    /// Nested entries, in configuration key order
    overrides: Vec<ScriptOverride>,
}

impl HealthConfig {
    /// Build a snapshot from ConfigMap `data`
    ///
    /// Keys unrelated to health customizations are ignored.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = HealthConfig::default();

        for (key, value) in data {
            if let Some(flat) = key.strip_prefix(HEALTH_KEY_PREFIX) {
                config = config.insert_flat_script(flat, value);
            } else if let Some(flat) = key.strip_prefix(OPEN_LIBS_KEY_PREFIX) {
                let enabled = parse_bool(key, value)?;
                config = config.insert_flat_open_libs(flat, enabled);
            } else if key == CUSTOMIZATIONS_KEY {
                config = config.insert_customizations(value)?;
            }
        }

        debug!(
            scripts = config.scripts.len(),
            overrides = config.overrides.len(),
            "Loaded health customizations"
        );
        Ok(config)
    }

    /// Build a snapshot from a ConfigMap (typically `argocd-cm`)
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self, ConfigError> {
        match &cm.data {
            Some(data) => Self::from_data(data),
            None => Ok(Self::default()),
        }
    }

    /// Add a flat per-kind script
    pub fn with_script(self, group: &str, kind: &str, script: impl Into<String>) -> Self {
        self.insert_flat_script(&format!("{}_{}", group, kind), &script.into())
    }

    /// Set the flat per-kind open libraries flag
    pub fn with_open_libs(self, group: &str, kind: &str, enabled: bool) -> Self {
        self.insert_flat_open_libs(&format!("{}_{}", group, kind), enabled)
    }

    /// Add a nested (possibly wildcarded) entry
    pub fn with_override(mut self, entry: ScriptOverride) -> Self {
        self.overrides.push(entry);
        self
    }

    pub fn flat_script(&self, flat_key: &str) -> Option<&str> {
        self.scripts.get(flat_key).map(String::as_str)
    }

    /// Open libraries flag for a flat key, closed unless set
    pub fn flat_open_libs(&self, flat_key: &str) -> bool {
        self.open_libs.get(flat_key).copied().unwrap_or(false)
    }

    pub fn overrides(&self) -> &[ScriptOverride] {
        &self.overrides
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.overrides.is_empty()
    }

    fn insert_flat_script(mut self, flat_key: &str, script: &str) -> Self {
        if !valid_flat_key(flat_key) {
            warn!(key = flat_key, "Ignoring health script with invalid flat key");
            return self;
        }
        self.scripts.insert(flat_key.to_string(), script.to_string());
        self
    }

    fn insert_flat_open_libs(mut self, flat_key: &str, enabled: bool) -> Self {
        if !valid_flat_key(flat_key) {
            warn!(key = flat_key, "Ignoring useOpenLibs flag with invalid flat key");
            return self;
        }
        self.open_libs.insert(flat_key.to_string(), enabled);
        self
    }

    fn insert_customizations(mut self, document: &str) -> Result<Self, ConfigError> {
        let entries: BTreeMap<String, CustomizationEntry> = serde_yaml::from_str(document)?;

        for (pattern, entry) in entries {
            let Some(script) = entry.health_lua else {
                continue;
            };
            // A pattern without a group segment addresses the core group
            let (group, kind) = pattern.split_once('/').unwrap_or(("", pattern.as_str()));
            if kind.is_empty() {
                warn!(pattern = %pattern, "Ignoring health customization without a kind");
                continue;
            }
            self.overrides.push(
                ScriptOverride::new(group, kind, script).with_open_libs(entry.use_open_libs),
            );
        }

        Ok(self)
    }
}

/// Flat keys must look like `<group>_<kind>` and can never carry wildcards:
/// ConfigMap key syntax forbids `*`, so one showing up is a mistake, not a glob.
fn valid_flat_key(flat_key: &str) -> bool {
    !flat_key.contains('*') && flat_key.contains('_')
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
