pub mod config;
pub mod fixtures;
pub mod health;
pub mod metrics;

// Re-export the evaluation entry points
pub use crate::config::{HealthConfig, ScriptLimits};
pub use crate::health::{
    aggregate, CheckRegistry, ChildHealth, EvaluationError, Evaluator, HealthStatus,
    HealthStatusCode,
};
