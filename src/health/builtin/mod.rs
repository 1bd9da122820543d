//! Built-in health predicates for well-known Kubernetes kinds
//!
//! Each predicate is a pure function `&DynamicObject -> HealthStatus`.
//! Kinds with an upstream schema are decoded into `k8s-openapi` types;
//! everything else reads the untyped document directly.
//!
//! Predicates never fail: absent or mistyped fields are treated as zero /
//! not equal, which lands on Progressing rather than an error.

pub mod apiservice;
pub mod argo;
pub mod hpa;
pub mod job;
pub mod pod;
pub mod service;
pub mod storage;
pub mod workloads;

use super::status::HealthStatus;
use k8s_openapi::Resource;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Sections whose fields may be dropped when they fail to decode
const LENIENT_SECTIONS: [&str; 2] = ["spec", "status"];

/// Decode the dynamic object into a typed resource and run `check` on it
///
/// The type metadata is rewritten to the typed resource's own, so older
/// API versions of a kind (`extensions/v1beta1` Deployments, `autoscaling/v1`
/// HPAs) decode with the current schema. Fields that do not fit the schema
/// are dropped and the check runs on what remains.
pub(crate) fn with_typed<K, F>(obj: &DynamicObject, check: F) -> HealthStatus
where
    K: Resource + DeserializeOwned,
    F: FnOnce(K) -> HealthStatus,
{
    let mut value = match serde_json::to_value(obj) {
        Ok(value) => value,
        Err(e) => return HealthStatus::progressing(format!("failed to read {}: {}", K::KIND, e)),
    };
    if let Some(fields) = value.as_object_mut() {
        fields.insert("apiVersion".into(), K::API_VERSION.into());
        fields.insert("kind".into(), K::KIND.into());
    }

    match decode_lenient::<K>(value) {
        Ok(typed) => check(typed),
        Err(e) => HealthStatus::progressing(format!("failed to decode {}: {}", K::KIND, e)),
    }
}

/// Decode `value`, dropping `spec`/`status` fields of the wrong shape
///
/// A field is dropped when removing it moves decoding past the current
/// error without surfacing a missing required field. If that is not enough,
/// whole sections go, and `metadata` (already validated) remains.
pub(crate) fn decode_lenient<K: DeserializeOwned>(mut value: Value) -> Result<K, serde_json::Error> {
    let mut error = match serde_json::from_value::<K>(value.clone()) {
        Ok(typed) => return Ok(typed),
        Err(e) => e,
    };

    'prune: loop {
        for (section, field) in section_fields(&value) {
            let mut candidate = value.clone();
            remove_field(&mut candidate, section, &field);
            match serde_json::from_value::<K>(candidate.clone()) {
                Ok(typed) => {
                    debug!(section, field = %field, error = %error, "Dropped unreadable field");
                    return Ok(typed);
                }
                Err(e) if moved_past(&error, &e) => {
                    debug!(section, field = %field, error = %error, "Dropped unreadable field");
                    value = candidate;
                    error = e;
                    continue 'prune;
                }
                Err(_) => {}
            }
        }
        break;
    }

    for section in LENIENT_SECTIONS {
        if let Some(fields) = value.as_object_mut() {
            if fields.remove(section).is_some() {
                debug!(section, error = %error, "Dropped unreadable section");
            }
        }
        match serde_json::from_value::<K>(value.clone()) {
            Ok(typed) => return Ok(typed),
            Err(e) => error = e,
        }
    }
    Err(error)
}

fn section_fields(value: &Value) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    for section in LENIENT_SECTIONS {
        if let Some(map) = value.get(section).and_then(Value::as_object) {
            fields.extend(map.keys().map(|field| (section, field.clone())));
        }
    }
    fields
}

fn remove_field(value: &mut Value, section: &str, field: &str) {
    if let Some(fields) = value.get_mut(section).and_then(Value::as_object_mut) {
        fields.remove(field);
    }
}

/// True when `after` is a different error that is not a missing required field
fn moved_past(before: &serde_json::Error, after: &serde_json::Error) -> bool {
    let after = after.to_string();
    after != before.to_string() && !after.starts_with("missing field")
}

/// Read a string field from the untyped part of the object (spec, status, ...)
pub(crate) fn str_at<'a>(obj: &'a DynamicObject, pointer: &str) -> Option<&'a str> {
    obj.data.pointer(pointer).and_then(|v| v.as_str())
}

/// True when the controller has observed the latest spec generation
///
/// Both values must be present; a missing one counts as "not observed".
pub(crate) fn generation_observed(generation: Option<i64>, observed: Option<i64>) -> bool {
    matches!((generation, observed), (Some(g), Some(o)) if o == g)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
