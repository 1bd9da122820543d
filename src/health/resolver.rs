//! Script resolution: which user-supplied (or bundled) script applies to a kind
//!
//! Lookup order, first match wins:
//! 1. flat key `<group>_<kind>` (exact only, never globbed)
//! 2. nested `resource.customizations` entries, most specific pattern first
//! 3. scripts bundled with this crate
//!
//! No match means the evaluator falls back to the built-in registry.

use super::bundled;
use super::error::EvaluationError;
use super::key::ResourceKey;
use crate::config::{HealthConfig, ScriptOverride};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use wildmatch::WildMatch;

/// Where a resolved script came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// `resource.customizations.health.<group>_<kind>`
    FlatKey(String),
    /// Nested entry, identified by its `<group>/<kind>` pattern
    Override(String),
    /// Shipped with the crate
    Bundled,
}

impl fmt::Display for ScriptOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptOrigin::FlatKey(key) => write!(f, "flat:{}", key),
            ScriptOrigin::Override(pattern) => write!(f, "override:{}", pattern),
            ScriptOrigin::Bundled => f.write_str("bundled"),
        }
    }
}

/// A resolved scripted check, borrowing its source from the config snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCheck<'a> {
    pub source: &'a str,
    pub open_libraries: bool,
    pub origin: ScriptOrigin,
}

/// Find the script that applies to `key`, if any
pub fn resolve_script<'a>(
    config: &'a HealthConfig,
    key: &ResourceKey,
) -> Result<Option<ScriptedCheck<'a>>, EvaluationError> {
    let flat_key = key.flat_key();
    if let Some(source) = config.flat_script(&flat_key) {
        return Ok(Some(ScriptedCheck {
            source,
            open_libraries: config.flat_open_libs(&flat_key),
            origin: ScriptOrigin::FlatKey(flat_key),
        }));
    }

    if let Some(entry) = best_override(config.overrides(), key)? {
        return Ok(Some(ScriptedCheck {
            source: &entry.script,
            open_libraries: entry.use_open_libs,
            origin: ScriptOrigin::Override(entry.pattern()),
        }));
    }

    Ok(bundled::lookup(&key.group, &key.kind).map(|source| ScriptedCheck {
        source,
        open_libraries: false,
        origin: ScriptOrigin::Bundled,
    }))
}

fn is_wildcard(c: char) -> bool {
    c == '*' || c == '?'
}

fn wildcard_count(pattern: &str) -> usize {
    pattern.chars().filter(|c| is_wildcard(*c)).count()
}

fn literal_len(pattern: &str) -> usize {
    pattern.chars().filter(|c| !is_wildcard(*c)).count()
}

/// How specific a pattern is; greater means more specific
///
/// Field order is the ranking: exact group beats any wildcard group, then
/// exact kind, then fewer wildcards, then more literal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Specificity {
    exact_group: bool,
    exact_kind: bool,
    group_wildcards: Reverse<usize>,
    kind_wildcards: Reverse<usize>,
    group_literal: usize,
    kind_literal: usize,
}

impl Specificity {
    fn of(entry: &ScriptOverride) -> Self {
        Self {
            exact_group: wildcard_count(&entry.group_pattern) == 0,
            exact_kind: wildcard_count(&entry.kind_pattern) == 0,
            group_wildcards: Reverse(wildcard_count(&entry.group_pattern)),
            kind_wildcards: Reverse(wildcard_count(&entry.kind_pattern)),
            group_literal: literal_len(&entry.group_pattern),
            kind_literal: literal_len(&entry.kind_pattern),
        }
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    if wildcard_count(pattern) == 0 {
        pattern == value
    } else {
        WildMatch::new(pattern).matches(value)
    }
}

/// Rank two matching entries: most specific first, then pattern text so the
/// result never depends on configuration order
fn compare_entries(a: &ScriptOverride, b: &ScriptOverride) -> Ordering {
    Specificity::of(b)
        .cmp(&Specificity::of(a))
        .then_with(|| a.group_pattern.cmp(&b.group_pattern))
        .then_with(|| a.kind_pattern.cmp(&b.kind_pattern))
}

/// Pick the most specific nested entry matching `key`
///
/// Two entries with identical patterns cannot be ordered and are reported
/// as ambiguous.
pub(crate) fn best_override<'a>(
    overrides: &'a [ScriptOverride],
    key: &ResourceKey,
) -> Result<Option<&'a ScriptOverride>, EvaluationError> {
    let mut candidates: Vec<&ScriptOverride> = overrides
        .iter()
        .filter(|o| pattern_matches(&o.group_pattern, &key.group))
        .filter(|o| pattern_matches(&o.kind_pattern, &key.kind))
        .collect();
    candidates.sort_by(|a, b| compare_entries(a, b));

    match candidates.as_slice() {
        [] => Ok(None),
        [best, runner_up, ..] if compare_entries(best, runner_up) == Ordering::Equal => {
            Err(EvaluationError::ResolutionAmbiguous {
                key: key.to_string(),
                patterns: candidates
                    .iter()
                    .filter(|c| compare_entries(best, c) == Ordering::Equal)
                    .map(|c| c.pattern())
                    .collect(),
            })
        }
        [best, ..] => Ok(Some(*best)),
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
