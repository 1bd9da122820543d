use super::aggregate::ChildHealth;
use super::error::EvaluationError;
use super::key::ResourceKey;
use super::registry::{BuiltinCheck, CheckRegistry};
use super::resolver::{resolve_script, ScriptedCheck};
use super::script::ScriptRuntime;
use super::status::HealthStatus;
use crate::config::HealthConfig;
use crate::metrics::SharedMetrics;
use kube::core::{DynamicObject, ResourceExt};
use std::time::Instant;
use tracing::{debug, warn};

/// Annotation excluding a resource from its parent's aggregation
pub const IGNORE_HEALTHCHECK_ANNOTATION: &str = "argocd.argoproj.io/ignore-healthcheck";

/// The check selected for a resource kind
#[derive(Clone)]
pub enum CheckBinding<'a> {
    Builtin(BuiltinCheck),
    Scripted(ScriptedCheck<'a>),
}

/// Which path produced a status, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    Script,
    Builtin,
    None,
    Ignored,
}

impl CheckSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckSource::Script => "script",
            CheckSource::Builtin => "builtin",
            CheckSource::None => "none",
            CheckSource::Ignored => "ignored",
        }
    }
}

/// True when the resource carries `argocd.argoproj.io/ignore-healthcheck: "true"`
pub fn ignores_health_check(obj: &DynamicObject) -> bool {
    obj.annotations()
        .get(IGNORE_HEALTHCHECK_ANNOTATION)
        .is_some_and(|v| v == "true")
}

/// Health evaluation entry point
///
/// Stateless apart from the immutable registry and limits it was built with,
/// so one evaluator can serve concurrent evaluations from many threads.
/// Every script run gets its own interpreter.
#[derive(Clone, Default)]
pub struct Evaluator {
    registry: CheckRegistry,
    runtime: ScriptRuntime,
    metrics: Option<SharedMetrics>,
}

impl Evaluator {
    pub fn new(registry: CheckRegistry, runtime: ScriptRuntime) -> Self {
        Self {
            registry,
            runtime,
            metrics: None,
        }
    }

    /// Record every evaluation into `metrics`
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    /// Select the check for a kind: a configured or bundled script first,
    /// then a built-in
    pub fn resolve<'a>(
        &self,
        key: &ResourceKey,
        config: &'a HealthConfig,
    ) -> Result<Option<CheckBinding<'a>>, EvaluationError> {
        if let Some(script) = resolve_script(config, key)? {
            return Ok(Some(CheckBinding::Scripted(script)));
        }
        Ok(self
            .registry
            .lookup(&key.group, &key.kind)
            .map(CheckBinding::Builtin))
    }

    /// Health of `obj` as its parent should count it
    ///
    /// Resources annotated with the ignore-healthcheck annotation report
    /// Healthy without running any check.
    pub fn evaluate(&self, obj: &DynamicObject, config: &HealthConfig) -> HealthStatus {
        if ignores_health_check(obj) {
            debug!(name = %obj.name_any(), "Health check ignored by annotation");
            let health = HealthStatus::healthy("");
            self.record(CheckSource::Ignored, &health);
            return health;
        }
        self.resource_health(obj, config)
    }

    /// Health of `obj` itself, regardless of the ignore-healthcheck annotation
    pub fn resource_health(&self, obj: &DynamicObject, config: &HealthConfig) -> HealthStatus {
        if obj.metadata.deletion_timestamp.is_some() {
            return HealthStatus::progressing("Pending deletion");
        }

        let Some(key) = ResourceKey::from_object(obj) else {
            return HealthStatus::unknown("resource has no apiVersion or kind");
        };

        let (source, health) = match self.resolve(&key, config) {
            Ok(Some(CheckBinding::Scripted(script))) => {
                (CheckSource::Script, self.run_script(&key, obj, &script))
            }
            Ok(Some(CheckBinding::Builtin(check))) => (CheckSource::Builtin, check(obj)),
            Ok(None) => {
                debug!(group = %key.group, kind = %key.kind, "No health check for kind");
                (CheckSource::None, HealthStatus::unknown(""))
            }
            Err(e) => (CheckSource::Script, self.script_failed(&key, obj, e)),
        };

        self.record(source, &health);
        health
    }

    /// Own health plus the ignore flag, ready for [`aggregate`](super::aggregate)
    pub fn child_health(&self, obj: &DynamicObject, config: &HealthConfig) -> ChildHealth {
        ChildHealth {
            health: self.resource_health(obj, config),
            ignore_health_check: ignores_health_check(obj),
        }
    }

    fn run_script(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
        script: &ScriptedCheck<'_>,
    ) -> HealthStatus {
        debug!(
            group = %key.group,
            kind = %key.kind,
            name = %obj.name_any(),
            origin = %script.origin,
            open_libraries = script.open_libraries,
            "Running health script"
        );

        let started = Instant::now();
        let result = self
            .runtime
            .run(script.source, obj, script.open_libraries);
        if let Some(metrics) = &self.metrics {
            metrics.observe_script_duration(started.elapsed().as_secs_f64());
        }

        match result {
            Ok(health) => health,
            Err(e) => self.script_failed(key, obj, e),
        }
    }

    /// A broken custom check degrades one resource to Unknown, nothing more
    fn script_failed(&self, key: &ResourceKey, obj: &DynamicObject, e: EvaluationError) -> HealthStatus {
        warn!(
            group = %key.group,
            kind = %key.kind,
            name = %obj.name_any(),
            reason = e.reason(),
            error = %e,
            "Health script failed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_script_failure(e.reason());
        }
        HealthStatus::unknown(e.to_string())
    }

    fn record(&self, source: CheckSource, health: &HealthStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(source.as_str(), health.status.as_str());
        }
    }
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod tests;
