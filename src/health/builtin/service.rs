//! Load balancer backed networking: Service and Ingress
//!
//! Both are Healthy once the load balancer reports at least one ingress
//! point with an address.

use super::with_typed;
use crate::health::status::HealthStatus;
use k8s_openapi::api::core::v1::Service;
use kube::core::DynamicObject;

const WAITING_FOR_ADDRESS: &str = "Waiting for load balancer to be assigned an address";

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

pub fn service_health(obj: &DynamicObject) -> HealthStatus {
    with_typed::<Service, _>(obj, |svc| {
        let is_load_balancer = svc
            .spec
            .as_ref()
            .and_then(|s| s.type_.as_deref())
            .is_some_and(|t| t == "LoadBalancer");
        if !is_load_balancer {
            return HealthStatus::healthy("");
        }

        let assigned = svc
            .status
            .and_then(|s| s.load_balancer)
            .and_then(|lb| lb.ingress)
            .unwrap_or_default()
            .iter()
            .any(|ingress| non_empty(ingress.hostname.as_deref()) || non_empty(ingress.ip.as_deref()));
        if assigned {
            HealthStatus::healthy("")
        } else {
            HealthStatus::progressing(WAITING_FOR_ADDRESS)
        }
    })
}

/// Ingress status differs between `extensions/v1beta1` and
/// `networking.k8s.io/v1`, so read the untyped document for both.
pub fn ingress_health(obj: &DynamicObject) -> HealthStatus {
    let assigned = obj
        .data
        .pointer("/status/loadBalancer/ingress")
        .and_then(|v| v.as_array())
        .is_some_and(|entries| {
            entries.iter().any(|entry| {
                non_empty(entry.get("hostname").and_then(|v| v.as_str()))
                    || non_empty(entry.get("ip").and_then(|v| v.as_str()))
            })
        });
    if assigned {
        HealthStatus::healthy("")
    } else {
        HealthStatus::progressing(WAITING_FOR_ADDRESS)
    }
}
