//! Argo custom kinds: Workflow and Application
//!
//! No upstream Rust types exist for these, so both read the untyped document.

use super::str_at;
use crate::health::status::{HealthStatus, HealthStatusCode};
use kube::core::DynamicObject;

pub fn workflow_health(obj: &DynamicObject) -> HealthStatus {
    let message = str_at(obj, "/status/message").unwrap_or_default();
    match str_at(obj, "/status/phase").unwrap_or_default() {
        "Succeeded" => HealthStatus::healthy(message),
        "Failed" | "Error" => HealthStatus::degraded(message),
        _ => HealthStatus::progressing(message),
    }
}

/// A child Application reports the health its own controller computed
pub fn application_health(obj: &DynamicObject) -> HealthStatus {
    let message = str_at(obj, "/status/health/message").unwrap_or_default();
    match str_at(obj, "/status/health/status").map(str::parse::<HealthStatusCode>) {
        Some(Ok(code)) => HealthStatus::new(code, message),
        Some(Err(e)) => HealthStatus::unknown(e.to_string()),
        None => HealthStatus::unknown(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::builtin::testing::object;
    use serde_json::json;

    fn workflow(phase: &str) -> DynamicObject {
        object(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": { "name": "build" },
            "status": { "phase": phase, "message": "step 2 failed" }
        }))
    }

    #[test]
    fn test_workflow_phases() {
        assert_eq!(workflow_health(&workflow("Succeeded")).status, HealthStatusCode::Healthy);
        assert_eq!(workflow_health(&workflow("Failed")).status, HealthStatusCode::Degraded);
        assert_eq!(workflow_health(&workflow("Error")).status, HealthStatusCode::Degraded);
        assert_eq!(workflow_health(&workflow("Running")).status, HealthStatusCode::Progressing);
        assert_eq!(workflow_health(&workflow("")).status, HealthStatusCode::Progressing);
    }

    #[test]
    fn test_application_reports_its_own_health() {
        let obj = object(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "guestbook" },
            "status": { "health": { "status": "Degraded", "message": "pod crashed" } }
        }));
        assert_eq!(application_health(&obj), HealthStatus::degraded("pod crashed"));
    }

    #[test]
    fn test_application_without_health_is_unknown() {
        let obj = object(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "guestbook" }
        }));
        assert_eq!(application_health(&obj).status, HealthStatusCode::Unknown);
    }
}
