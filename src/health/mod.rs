//! Resource health evaluation
//!
//! A resource's health is computed by, in order: a user-configured Lua
//! script for its kind, a script bundled with the crate, or a built-in Rust
//! check. Parents combine their children's results with [`aggregate`].

pub mod aggregate;
pub mod builtin;
pub mod bundled;
pub mod error;
pub mod evaluator;
pub mod key;
pub mod registry;
pub mod resolver;
pub mod script;
pub mod status;

pub use aggregate::{aggregate, aggregate_statuses, worst_code, ChildHealth};
pub use error::EvaluationError;
pub use evaluator::{
    ignores_health_check, CheckBinding, CheckSource, Evaluator, IGNORE_HEALTHCHECK_ANNOTATION,
};
pub use key::ResourceKey;
pub use registry::{BuiltinCheck, CheckRegistry};
pub use resolver::{resolve_script, ScriptOrigin, ScriptedCheck};
pub use script::ScriptRuntime;
pub use status::{HealthStatus, HealthStatusCode, UnknownStatusLiteral};
