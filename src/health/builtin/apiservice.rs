use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::kube_aggregator::pkg::apis::apiregistration::v1::APIService;
use kube::core::DynamicObject;

pub fn api_service_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<APIService, _>(obj, |svc| {
        let available = svc
            .status
            .and_then(|s| s.conditions)
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.type_ == "Available");

        match available {
            Some(c) if c.status == "True" => {
                HealthStatus::healthy(c.message.unwrap_or_default())
            }
            Some(c) => HealthStatus::progressing(c.message.unwrap_or_default()),
            None => HealthStatus::progressing("Waiting to be processed"),
        }
    })
}
