//! Reduce immediate children's health into one parent status
//!
//! The parent takes the worst child status under
//! `Healthy < Suspended < Progressing < Missing < Degraded < Unknown`.
//! Children marked with the ignore-healthcheck annotation are left out
//! entirely, and an empty set is Healthy.
//!
//! This only ever looks one level down: the statuses passed in are final.
//! Whether a parent reflects deeper descendants is up to its own check.

use super::status::{HealthStatus, HealthStatusCode};
use std::collections::BTreeSet;

/// Separator between messages of equally-worst children
pub const MESSAGE_SEPARATOR: &str = "; ";

/// One immediate child as seen by its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildHealth {
    pub health: HealthStatus,
    /// Set from the child's ignore-healthcheck annotation
    pub ignore_health_check: bool,
}

impl ChildHealth {
    pub fn new(health: HealthStatus) -> Self {
        Self {
            health,
            ignore_health_check: false,
        }
    }

    pub fn ignored(health: HealthStatus) -> Self {
        Self {
            health,
            ignore_health_check: true,
        }
    }
}

impl From<HealthStatus> for ChildHealth {
    fn from(health: HealthStatus) -> Self {
        Self::new(health)
    }
}

/// Aggregate the health of a parent from its immediate children
///
/// The message joins the distinct, non-empty messages of every child at the
/// worst level in sorted order, so permuting the input never changes the
/// result.
pub fn aggregate<'a, I>(children: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a ChildHealth>,
{
    let counted: Vec<&HealthStatus> = children
        .into_iter()
        .filter(|child| !child.ignore_health_check)
        .map(|child| &child.health)
        .collect();

    let Some(worst) = counted.iter().map(|h| h.status).max() else {
        return HealthStatus::healthy("");
    };

    let messages: BTreeSet<&str> = counted
        .iter()
        .filter(|h| h.status == worst)
        .map(|h| h.message.as_str())
        .filter(|m| !m.is_empty())
        .collect();

    HealthStatus::new(
        worst,
        messages.into_iter().collect::<Vec<_>>().join(MESSAGE_SEPARATOR),
    )
}

/// Aggregate plain statuses, none of them ignored
pub fn aggregate_statuses<'a, I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = &'a HealthStatus>,
{
    let children: Vec<ChildHealth> = statuses.into_iter().cloned().map(ChildHealth::new).collect();
    aggregate(&children)
}

/// Worst status code among `codes`, Healthy when empty
pub fn worst_code<I>(codes: I) -> HealthStatusCode
where
    I: IntoIterator<Item = HealthStatusCode>,
{
    codes.into_iter().max().unwrap_or(HealthStatusCode::Healthy)
}
