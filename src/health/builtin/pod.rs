use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;

/// Container waiting reasons that will not resolve on their own
const DEGRADED_WAITING_REASONS: [&str; 5] = [
    "CrashLoopBackOff",
    "ErrImagePull",
    "ImagePullBackOff",
    "CreateContainerConfigError",
    "InvalidImageName",
];

pub fn pod_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<Pod, _>(obj, |pod| {
        let restart_always = pod
            .spec
            .as_ref()
            .and_then(|s| s.restart_policy.as_deref())
            .map_or(true, |p| p == "Always");
        let status = pod.status.unwrap_or_default();
        let message = status.message.clone().unwrap_or_default();

        let containers = status
            .init_container_statuses
            .iter()
            .flatten()
            .chain(status.container_statuses.iter().flatten());
        for container in containers {
            let waiting = container.state.as_ref().and_then(|s| s.waiting.as_ref());
            if let Some(waiting) = waiting {
                let reason = waiting.reason.as_deref().unwrap_or_default();
                if DEGRADED_WAITING_REASONS.contains(&reason) {
                    return HealthStatus::degraded(
                        waiting.message.clone().unwrap_or_else(|| reason.to_string()),
                    );
                }
            }
        }

        match status.phase.as_deref() {
            Some("Succeeded") => HealthStatus::healthy(message),
            Some("Failed") => HealthStatus::degraded(message),
            Some("Pending") => HealthStatus::progressing(message),
            Some("Running") => {
                let all_ready = status
                    .container_statuses
                    .iter()
                    .flatten()
                    .all(|c| c.ready);
                if restart_always && all_ready {
                    HealthStatus::healthy(message)
                } else {
                    HealthStatus::progressing(message)
                }
            }
            _ => HealthStatus::unknown(message),
        }
    })
}
