use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::core::DynamicObject;

/// HorizontalPodAutoscaler health from its status conditions
///
/// A False condition with a `Failed*` reason (metrics unavailable, scale
/// subresource missing, ...) is Degraded; `AbleToScale=True` is Healthy.
pub fn hpa_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<HorizontalPodAutoscaler, _>(obj, |hpa| {
        let conditions = hpa.status.and_then(|s| s.conditions).unwrap_or_default();

        if let Some(failed) = conditions.iter().find(|c| {
            c.status == "False" && c.reason.as_deref().is_some_and(|r| r.starts_with("Failed"))
        }) {
            return HealthStatus::degraded(failed.message.clone().unwrap_or_default());
        }

        match conditions
            .iter()
            .find(|c| c.type_ == "AbleToScale" && c.status == "True")
        {
            Some(able) => HealthStatus::healthy(able.message.clone().unwrap_or_default()),
            None => HealthStatus::progressing("Waiting to Autoscale"),
        }
    })
}
