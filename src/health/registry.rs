//! Registry of built-in health predicates keyed by group/kind
//!
//! Absence of an entry means "no built-in check for this kind", which is
//! distinct from a check that ran and returned Unknown.

use super::builtin::{apiservice, argo, hpa, job, pod, service, storage, workloads};
use super::key::ResourceKey;
use super::status::HealthStatus;
use kube::core::DynamicObject;
use std::collections::HashMap;

/// A native health predicate
pub type BuiltinCheck = fn(&DynamicObject) -> HealthStatus;

/// Immutable map from `(group, kind)` to a built-in predicate
#[derive(Clone)]
pub struct CheckRegistry {
    checks: HashMap<ResourceKey, BuiltinCheck>,
}

impl CheckRegistry {
    /// Registry with no checks at all
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Registry with every well-known kind registered
    pub fn with_builtins() -> Self {
        Self::empty()
            .register("", "Pod", pod::pod_health)
            .register("", "Service", service::service_health)
            .register("", "PersistentVolumeClaim", storage::pvc_health)
            .register("apiregistration.k8s.io", "APIService", apiservice::api_service_health)
            .register("apps", "Deployment", workloads::deployment_health)
            .register("extensions", "Deployment", workloads::deployment_health)
            .register("apps", "ReplicaSet", workloads::replica_set_health)
            .register("extensions", "ReplicaSet", workloads::replica_set_health)
            .register("apps", "StatefulSet", workloads::stateful_set_health)
            .register("apps", "DaemonSet", workloads::daemon_set_health)
            .register("extensions", "DaemonSet", workloads::daemon_set_health)
            .register("autoscaling", "HorizontalPodAutoscaler", hpa::hpa_health)
            .register("batch", "Job", job::job_health)
            .register("extensions", "Ingress", service::ingress_health)
            .register("networking.k8s.io", "Ingress", service::ingress_health)
            .register("argoproj.io", "Workflow", argo::workflow_health)
            .register("argoproj.io", "Application", argo::application_health)
    }

    /// Return a registry with `check` registered for `(group, kind)`
    ///
    /// Replaces any existing entry for the same key.
    pub fn register(mut self, group: &str, kind: &str, check: BuiltinCheck) -> Self {
        self.checks.insert(ResourceKey::new(group, kind), check);
        self
    }

    pub fn lookup(&self, group: &str, kind: &str) -> Option<BuiltinCheck> {
        self.checks.get(&ResourceKey::new(group, kind)).copied()
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> Vec<&ResourceKey> {
        let mut keys: Vec<_> = self.checks.keys().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
