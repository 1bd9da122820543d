//! Health scripts shipped with the crate
//!
//! Sources live under `resource_customizations/<group>/<kind>/health.lua`
//! next to their fixture suites, and are compiled in. User configuration
//! always takes precedence over these.

const BUNDLED: &[(&str, &str, &str)] = &[
    (
        "cert-manager.io",
        "Certificate",
        include_str!("../../resource_customizations/cert-manager.io/Certificate/health.lua"),
    ),
    (
        "cert-manager.io",
        "Issuer",
        include_str!("../../resource_customizations/cert-manager.io/Issuer/health.lua"),
    ),
    (
        "cert-manager.io",
        "ClusterIssuer",
        include_str!("../../resource_customizations/cert-manager.io/ClusterIssuer/health.lua"),
    ),
];

/// Bundled script for `(group, kind)`, if one ships with the crate
pub fn lookup(group: &str, kind: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(g, k, _)| *g == group && *k == kind)
        .map(|(_, _, source)| *source)
}

/// Every bundled `(group, kind)` pair
pub fn kinds() -> impl Iterator<Item = (&'static str, &'static str)> {
    BUNDLED.iter().map(|(g, k, _)| (*g, *k))
}
