//! Replica-managing workloads: Deployment, ReplicaSet, StatefulSet, DaemonSet
//!
//! All four share one rule: Healthy once the controller has observed the
//! current generation and every desired replica runs the updated template.

use super::{generation_observed, with_typed};
use crate::health::status::HealthStatus;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use kube::core::DynamicObject;

/// Kubernetes defaults `spec.replicas` to 1 when omitted
const DEFAULT_REPLICAS: i32 = 1;

fn rollout_health(kind: &str, generation_ok: bool, updated: i32, desired: i32) -> HealthStatus {
    if !generation_ok {
        return HealthStatus::progressing(format!(
            "Waiting for rollout to finish: observed {} generation less than desired generation",
            kind
        ));
    }
    if updated != desired {
        return HealthStatus::progressing(format!(
            "Waiting for rollout to finish: {} out of {} new replicas have been updated...",
            updated, desired
        ));
    }
    HealthStatus::healthy("")
}

pub fn deployment_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<Deployment, _>(obj, |deployment| {
        let spec = deployment.spec.unwrap_or_default();
        if spec.paused == Some(true) {
            return HealthStatus::suspended("Deployment is paused");
        }

        let status = deployment.status.unwrap_or_default();
        let deadline_exceeded = status.conditions.iter().flatten().any(|c| {
            c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
        });
        if deadline_exceeded {
            return HealthStatus::degraded(format!(
                "Deployment {:?} exceeded its progress deadline",
                deployment.metadata.name.unwrap_or_default()
            ));
        }

        rollout_health(
            "deployment",
            generation_observed(deployment.metadata.generation, status.observed_generation),
            status.updated_replicas.unwrap_or(0),
            spec.replicas.unwrap_or(DEFAULT_REPLICAS),
        )
    })
}

/// ReplicaSets have no `updatedReplicas`; every available replica runs the
/// set's only template, so available replicas stand in for updated ones.
pub fn replica_set_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<ReplicaSet, _>(obj, |rs| {
        let status = rs.status.unwrap_or_default();
        rollout_health(
            "replica set",
            generation_observed(rs.metadata.generation, status.observed_generation),
            status.available_replicas.unwrap_or(0),
            rs.spec.and_then(|s| s.replicas).unwrap_or(DEFAULT_REPLICAS),
        )
    })
}

pub fn stateful_set_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<StatefulSet, _>(obj, |sts| {
        let status = sts.status.unwrap_or_default();
        rollout_health(
            "statefulset",
            generation_observed(sts.metadata.generation, status.observed_generation),
            status.updated_replicas.unwrap_or(0),
            sts.spec.and_then(|s| s.replicas).unwrap_or(DEFAULT_REPLICAS),
        )
    })
}

/// DaemonSet desired count comes from the scheduler, not the spec
pub fn daemon_set_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<DaemonSet, _>(obj, |ds| {
        let status = ds.status.unwrap_or_default();
        rollout_health(
            "daemon set",
            generation_observed(ds.metadata.generation, status.observed_generation),
            status.updated_number_scheduled.unwrap_or(0),
            status.desired_number_scheduled,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::builtin::testing::object;
    use crate::health::status::HealthStatusCode;
    use serde_json::json;

    fn deployment(generation: i64, observed: i64, replicas: i32, updated: i32) -> DynamicObject {
        object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "default", "generation": generation },
            "spec": { "replicas": replicas },
            "status": { "observedGeneration": observed, "updatedReplicas": updated }
        }))
    }

    #[test]
    fn test_deployment_healthy_when_rolled_out() {
        let health = deployment_health(&deployment(2, 2, 3, 3));
        assert_eq!(health.status, HealthStatusCode::Healthy);
    }

    #[test]
    fn test_deployment_progressing_on_stale_generation() {
        let health = deployment_health(&deployment(2, 1, 3, 3));
        assert_eq!(health.status, HealthStatusCode::Progressing);
        assert!(health.message.contains("generation"));
    }

    #[test]
    fn test_deployment_progressing_while_replicas_update() {
        let health = deployment_health(&deployment(2, 2, 3, 1));
        assert_eq!(health.status, HealthStatusCode::Progressing);
        assert!(health.message.contains("1 out of 3"));
    }

    #[test]
    fn test_deployment_without_status_is_progressing() {
        let obj = object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "generation": 1 },
            "spec": { "replicas": 2 }
        }));
        assert_eq!(deployment_health(&obj).status, HealthStatusCode::Progressing);
    }

    #[test]
    fn test_deployment_paused_is_suspended() {
        let obj = object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "generation": 1 },
            "spec": { "replicas": 2, "paused": true },
            "status": { "observedGeneration": 1, "updatedReplicas": 0 }
        }));
        assert_eq!(deployment_health(&obj).status, HealthStatusCode::Suspended);
    }

    #[test]
    fn test_deployment_progress_deadline_is_degraded() {
        let obj = object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "generation": 3 },
            "spec": { "replicas": 2 },
            "status": {
                "observedGeneration": 3,
                "updatedReplicas": 1,
                "conditions": [{
                    "type": "Progressing",
                    "status": "False",
                    "reason": "ProgressDeadlineExceeded"
                }]
            }
        }));
        let health = deployment_health(&obj);
        assert_eq!(health.status, HealthStatusCode::Degraded);
        assert!(health.message.contains("\"web\""));
    }

    #[test]
    fn test_deployment_check_is_pure() {
        let obj = deployment(4, 4, 2, 2);
        assert_eq!(deployment_health(&obj), deployment_health(&obj));
    }

    #[test]
    fn test_stateful_set_rules() {
        let healthy = object(json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": { "name": "db", "generation": 5 },
            "spec": { "replicas": 3, "serviceName": "db" },
            "status": { "replicas": 3, "observedGeneration": 5, "updatedReplicas": 3 }
        }));
        assert_eq!(stateful_set_health(&healthy).status, HealthStatusCode::Healthy);

        let rolling = object(json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": { "name": "db", "generation": 5 },
            "spec": { "replicas": 3, "serviceName": "db" },
            "status": { "replicas": 3, "observedGeneration": 5, "updatedReplicas": 2 }
        }));
        assert_eq!(stateful_set_health(&rolling).status, HealthStatusCode::Progressing);
    }

    #[test]
    fn test_daemon_set_uses_scheduled_counts() {
        let obj = object(json!({
            "apiVersion": "apps/v1",
            "kind": "DaemonSet",
            "metadata": { "name": "agent", "generation": 1 },
            "status": {
                "observedGeneration": 1,
                "desiredNumberScheduled": 4,
                "currentNumberScheduled": 4,
                "numberMisscheduled": 0,
                "numberReady": 4,
                "updatedNumberScheduled": 4
            }
        }));
        assert_eq!(daemon_set_health(&obj).status, HealthStatusCode::Healthy);
    }

    #[test]
    fn test_replica_set_uses_available_replicas() {
        let obj = object(json!({
            "apiVersion": "apps/v1",
            "kind": "ReplicaSet",
            "metadata": { "name": "web-abc", "generation": 1 },
            "spec": { "replicas": 2 },
            "status": { "replicas": 2, "observedGeneration": 1, "availableReplicas": 1 }
        }));
        assert_eq!(replica_set_health(&obj).status, HealthStatusCode::Progressing);
    }
}
