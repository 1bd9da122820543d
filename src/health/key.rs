use kube::core::{DynamicObject, GroupVersion};
use std::fmt;

/// Group/kind pair identifying a resource type for check lookup
///
/// `group` is empty for core API resources (`v1` Pods, Services, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub group: String,
    pub kind: String,
}

impl ResourceKey {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Derive the key from a resource's `apiVersion` and `kind`
    ///
    /// Returns None when either is missing.
    pub fn from_object(obj: &DynamicObject) -> Option<Self> {
        let types = obj.types.as_ref()?;
        if types.api_version.is_empty() || types.kind.is_empty() {
            return None;
        }
        let gv: GroupVersion = types.api_version.parse().ok()?;
        Some(Self::new(gv.group, types.kind.clone()))
    }

    /// Key used by flat ConfigMap entries: `<group>_<kind>`
    pub fn flat_key(&self) -> String {
        format!("{}_{}", self.group, self.kind)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}/{}", self.group, self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(api_version: &str, kind: &str) -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": { "name": "x" }
        }))
        .expect("valid object")
    }

    #[test]
    fn test_key_from_grouped_api_version() {
        let key = ResourceKey::from_object(&object("apps/v1", "Deployment"));
        assert_eq!(key, Some(ResourceKey::new("apps", "Deployment")));
    }

    #[test]
    fn test_key_from_core_api_version() {
        let key = ResourceKey::from_object(&object("v1", "Service"));
        assert_eq!(key, Some(ResourceKey::new("", "Service")));
        assert_eq!(key.map(|k| k.flat_key()), Some("_Service".to_string()));
    }

    #[test]
    fn test_key_requires_type_meta() {
        let obj: DynamicObject =
            serde_json::from_value(serde_json::json!({ "metadata": { "name": "x" } }))
                .expect("valid object");
        assert_eq!(ResourceKey::from_object(&obj), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ResourceKey::new("cert-manager.io", "Certificate").to_string(),
            "cert-manager.io/Certificate"
        );
        assert_eq!(ResourceKey::new("", "Pod").to_string(), "Pod");
    }
}
