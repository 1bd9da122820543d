use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::core::DynamicObject;

pub fn pvc_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<PersistentVolumeClaim, _>(obj, |pvc| {
        match pvc.status.and_then(|s| s.phase).as_deref() {
            Some("Bound") => HealthStatus::healthy(""),
            Some(phase) => HealthStatus::progressing(format!("Claim is {}", phase)),
            None => HealthStatus::progressing("Waiting for claim to be bound"),
        }
    })
}
