#![allow(clippy::unwrap_used)] // Tests can use unwrap for brevity
#![allow(clippy::expect_used)] // Tests can use expect for better error messages

use super::*;

const FLAT: &str = r#"return { status = "Healthy", message = "flat" }"#;
const EXACT: &str = r#"return { status = "Healthy", message = "exact" }"#;
const GROUP_GLOB: &str = r#"return { status = "Healthy", message = "group glob" }"#;
const KIND_GLOB: &str = r#"return { status = "Healthy", message = "kind glob" }"#;
const ANY: &str = r#"return { status = "Healthy", message = "any" }"#;

fn widget() -> ResourceKey {
    ResourceKey::new("stable.example.com", "Widget")
}

fn resolved_source<'a>(config: &'a HealthConfig, key: &ResourceKey) -> Option<&'a str> {
    resolve_script(config, key)
        .expect("resolution succeeds")
        .map(|check| check.source)
}

#[test]
fn test_nothing_configured() {
    let config = HealthConfig::default();
    assert_eq!(resolve_script(&config, &widget()), Ok(None));
    assert_eq!(
        resolve_script(&config, &ResourceKey::new("apps", "Deployment")),
        Ok(None)
    );
}

#[test]
fn test_flat_key_beats_any_wildcard() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("stable.example.com", "Widget", EXACT))
        .with_override(ScriptOverride::new("*", "*", ANY))
        .with_script("stable.example.com", "Widget", FLAT);

    let check = resolve_script(&config, &widget()).unwrap().unwrap();
    assert_eq!(check.source, FLAT);
    assert_eq!(
        check.origin,
        ScriptOrigin::FlatKey("stable.example.com_Widget".to_string())
    );
}

#[test]
fn test_exact_nested_entry_beats_wildcards() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.example.com", "Widget", GROUP_GLOB))
        .with_override(ScriptOverride::new("stable.example.com", "Widget", EXACT))
        .with_override(ScriptOverride::new("*", "*", ANY));

    let check = resolve_script(&config, &widget()).unwrap().unwrap();
    assert_eq!(check.source, EXACT);
    assert_eq!(
        check.origin,
        ScriptOrigin::Override("stable.example.com/Widget".to_string())
    );
}

#[test]
fn test_exact_group_beats_wildcard_group() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.example.com", "Widget", GROUP_GLOB))
        .with_override(ScriptOverride::new("stable.example.com", "Wid*", KIND_GLOB));

    assert_eq!(resolved_source(&config, &widget()), Some(KIND_GLOB));
}

#[test]
fn test_fewer_wildcards_win() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.example.*", "*", ANY))
        .with_override(ScriptOverride::new("*.example.com", "*", GROUP_GLOB));

    assert_eq!(resolved_source(&config, &widget()), Some(GROUP_GLOB));
}

#[test]
fn test_longer_literal_wins_at_equal_wildcards() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.com", "Widget", ANY))
        .with_override(ScriptOverride::new("*.example.com", "Widget", GROUP_GLOB));

    assert_eq!(resolved_source(&config, &widget()), Some(GROUP_GLOB));
}

#[test]
fn test_result_does_not_depend_on_config_order() {
    let entries = vec![
        ScriptOverride::new("*", "*", ANY),
        ScriptOverride::new("*.example.com", "*", GROUP_GLOB),
        ScriptOverride::new("stable.*.com", "W*", KIND_GLOB),
    ];

    let forward = entries
        .iter()
        .cloned()
        .fold(HealthConfig::default(), HealthConfig::with_override);
    let backward = entries
        .iter()
        .rev()
        .cloned()
        .fold(HealthConfig::default(), HealthConfig::with_override);

    let a = resolve_script(&forward, &widget()).unwrap().unwrap();
    let b = resolve_script(&backward, &widget()).unwrap().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_non_matching_entries_are_skipped() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.example.org", "*", ANY))
        .with_override(ScriptOverride::new("stable.example.com", "Gadget", EXACT));

    assert_eq!(resolved_source(&config, &widget()), None);
}

#[test]
fn test_open_libraries_follow_chosen_source() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*", "*", ANY).with_open_libs(true))
        .with_script("stable.example.com", "Widget", FLAT);

    let flat = resolve_script(&config, &widget()).unwrap().unwrap();
    assert!(!flat.open_libraries);

    let other = resolve_script(&config, &ResourceKey::new("other.io", "Thing"))
        .unwrap()
        .unwrap();
    assert_eq!(other.source, ANY);
    assert!(other.open_libraries);

    let config = config.with_open_libs("stable.example.com", "Widget", true);
    assert!(resolve_script(&config, &widget()).unwrap().unwrap().open_libraries);
}

#[test]
fn test_flat_open_libs_without_script_is_inert() {
    let config = HealthConfig::default().with_open_libs("stable.example.com", "Widget", true);
    assert_eq!(resolve_script(&config, &widget()), Ok(None));
}

#[test]
fn test_core_group_flat_key() {
    let config = HealthConfig::default().with_script("", "Pod", FLAT);
    assert_eq!(
        resolved_source(&config, &ResourceKey::new("", "Pod")),
        Some(FLAT)
    );
    assert_eq!(resolved_source(&config, &ResourceKey::new("apps", "Pod")), None);
}

#[test]
fn test_bundled_script_used_when_nothing_configured() {
    let key = ResourceKey::new("cert-manager.io", "Certificate");
    let config = HealthConfig::default();
    let check = resolve_script(&config, &key)
        .unwrap()
        .unwrap();
    assert_eq!(check.origin, ScriptOrigin::Bundled);
    assert!(!check.open_libraries);
    assert_eq!(Some(check.source), bundled::lookup("cert-manager.io", "Certificate"));
}

#[test]
fn test_configuration_overrides_bundled_script() {
    let key = ResourceKey::new("cert-manager.io", "Certificate");

    let flat = HealthConfig::default().with_script("cert-manager.io", "Certificate", FLAT);
    assert_eq!(resolved_source(&flat, &key), Some(FLAT));

    let nested = HealthConfig::default().with_override(ScriptOverride::new("cert-manager.io", "*", KIND_GLOB));
    assert_eq!(resolved_source(&nested, &key), Some(KIND_GLOB));
}

#[test]
fn test_identical_patterns_are_ambiguous() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*.example.com", "*", ANY))
        .with_override(ScriptOverride::new("*.example.com", "*", GROUP_GLOB));

    match resolve_script(&config, &widget()) {
        Err(EvaluationError::ResolutionAmbiguous { key, patterns }) => {
            assert_eq!(key, "stable.example.com/Widget");
            assert_eq!(patterns, vec!["*.example.com/*", "*.example.com/*"]);
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }
}

#[test]
fn test_duplicates_below_the_winner_are_not_ambiguous() {
    let config = HealthConfig::default()
        .with_override(ScriptOverride::new("*", "*", ANY))
        .with_override(ScriptOverride::new("*", "*", GROUP_GLOB))
        .with_override(ScriptOverride::new("stable.example.com", "Widget", EXACT));

    assert_eq!(resolved_source(&config, &widget()), Some(EXACT));
}

#[test]
fn test_pattern_matching() {
    assert!(pattern_matches("apps", "apps"));
    assert!(!pattern_matches("apps", "apps.v2"));
    assert!(pattern_matches("*.k8s.io", "networking.k8s.io"));
    assert!(!pattern_matches("*.k8s.io", "k8s.io.example"));
    assert!(pattern_matches("Cron?ob", "CronJob"));
    assert!(pattern_matches("*", ""));
}
