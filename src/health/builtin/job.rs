use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::api::batch::v1::Job;
use kube::core::DynamicObject;

pub fn job_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<Job, _>(obj, |job| {
        if job.spec.as_ref().and_then(|s| s.suspend) == Some(true) {
            return HealthStatus::suspended("Job is suspended");
        }

        let status = job.status.unwrap_or_default();
        for condition in status.conditions.iter().flatten() {
            if condition.status != "True" {
                continue;
            }
            let message = condition.message.clone().unwrap_or_default();
            match condition.type_.as_str() {
                "Complete" => {
                    return HealthStatus::healthy(if message.is_empty() {
                        "Job completed".to_string()
                    } else {
                        message
                    })
                }
                "Failed" => return HealthStatus::degraded(message),
                _ => {}
            }
        }

        HealthStatus::progressing("Job is running")
    })
}
