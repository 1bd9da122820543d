//! Fixture suites for health scripts
//!
//! A suite is a directory holding `health.lua`, a `health_test.yaml` index
//! and the resource documents it points at:
//!
//! ```yaml
//! tests:
//! - healthStatus:
//!     status: Degraded
//!     message: Issuer is not ready
//!   inputPath: testdata/degraded.yaml
//! ```
//!
//! Each case runs the script against its input and compares the result,
//! message included, with the expected status.

use crate::health::{HealthStatus, ScriptRuntime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Index file naming a suite's cases
pub const TEST_INDEX_FILE: &str = "health_test.yaml";

/// Script under test, next to the index
pub const SCRIPT_FILE: &str = "health.lua";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
struct TestIndex {
    #[serde(default)]
    tests: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestCase {
    input_path: String,
    health_status: HealthStatus,
}

/// One resource document and the status a script must produce for it
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub name: String,
    pub input: serde_json::Value,
    pub expected: HealthStatus,
}

impl Fixture {
    pub fn new(name: impl Into<String>, input: serde_json::Value, expected: HealthStatus) -> Self {
        Self {
            name: name.into(),
            input,
            expected,
        }
    }
}

/// Result of running one fixture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureOutcome {
    pub name: String,
    pub expected: HealthStatus,
    /// What the script produced; script errors show up as Unknown
    pub actual: HealthStatus,
    pub passed: bool,
}

/// Run `script` against one fixture
pub fn run_fixture(
    runtime: &ScriptRuntime,
    script: &str,
    open_libraries: bool,
    fixture: &Fixture,
) -> FixtureOutcome {
    let actual = runtime
        .run_document(script, &fixture.input, open_libraries)
        .unwrap_or_else(|e| HealthStatus::unknown(e.to_string()));
    FixtureOutcome {
        name: fixture.name.clone(),
        passed: actual == fixture.expected,
        expected: fixture.expected.clone(),
        actual,
    }
}

/// A script plus its fixtures, loaded from one directory
#[derive(Debug, Clone)]
pub struct FixtureSuite {
    pub dir: PathBuf,
    pub script: String,
    pub open_libraries: bool,
    pub fixtures: Vec<Fixture>,
}

impl FixtureSuite {
    /// Load `health.lua` and every case listed in `health_test.yaml`
    ///
    /// Input paths are relative to `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let dir = dir.as_ref().to_path_buf();
        let script = read(&dir.join(SCRIPT_FILE))?;

        let index_path = dir.join(TEST_INDEX_FILE);
        let index: TestIndex = parse(&index_path, &read(&index_path)?)?;

        let mut fixtures = Vec::with_capacity(index.tests.len());
        for case in index.tests {
            let input_path = dir.join(&case.input_path);
            let input: serde_json::Value = parse(&input_path, &read(&input_path)?)?;
            fixtures.push(Fixture::new(case.input_path, input, case.health_status));
        }

        debug!(dir = %dir.display(), fixtures = fixtures.len(), "Loaded fixture suite");
        Ok(Self {
            dir,
            script,
            open_libraries: false,
            fixtures,
        })
    }

    /// Run the script with every standard library available
    pub fn with_open_libraries(mut self, open_libraries: bool) -> Self {
        self.open_libraries = open_libraries;
        self
    }

    /// Run every fixture, in index order
    pub fn run(&self, runtime: &ScriptRuntime) -> Vec<FixtureOutcome> {
        self.fixtures
            .iter()
            .map(|fixture| run_fixture(runtime, &self.script, self.open_libraries, fixture))
            .collect()
    }
}

/// Every directory under `root` (itself included) holding a test index,
/// sorted by path
///
/// Symbolic links are not followed.
pub fn discover(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, FixtureError> {
    let mut found = Vec::new();
    let mut pending = vec![root.as_ref().to_path_buf()];

    while let Some(dir) = pending.pop() {
        if dir.join(TEST_INDEX_FILE).is_file() {
            found.push(dir.clone());
        }
        let entries = fs::read_dir(&dir).map_err(|source| FixtureError::Read {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| FixtureError::Read {
                path: dir.clone(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| FixtureError::Read {
                path: entry.path(),
                source,
            })?;
            if file_type.is_dir() {
                pending.push(entry.path());
            }
        }
    }

    found.sort();
    Ok(found)
}

fn read(path: &Path) -> Result<String, FixtureError> {
    fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, contents: &str) -> Result<T, FixtureError> {
    serde_yaml::from_str(contents).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatusCode;
    use serde_json::json;

    const SCRIPT: &str = r#"
if obj.status ~= nil and obj.status.ready then
  return { status = "Healthy", message = "ready" }
end
return { status = "Progressing", message = "waiting" }
"#;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    fn suite_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), SCRIPT_FILE, SCRIPT);
        write(
            dir.path(),
            TEST_INDEX_FILE,
            r#"
tests:
- healthStatus:
    status: Healthy
    message: ready
  inputPath: testdata/ready.yaml
- healthStatus:
    status: Progressing
  inputPath: testdata/waiting.yaml
"#,
        );
        write(
            dir.path(),
            "testdata/ready.yaml",
            "apiVersion: example.com/v1\nkind: Widget\nstatus:\n  ready: true\n",
        );
        write(
            dir.path(),
            "testdata/waiting.yaml",
            "apiVersion: example.com/v1\nkind: Widget\nstatus:\n  ready: false\n",
        );
        dir
    }

    #[test]
    fn test_run_fixture_pass_and_fail() {
        let runtime = ScriptRuntime::default();
        let fixture = Fixture::new(
            "ready",
            json!({ "status": { "ready": true } }),
            HealthStatus::healthy("ready"),
        );
        let outcome = run_fixture(&runtime, SCRIPT, false, &fixture);
        assert!(outcome.passed);
        assert_eq!(outcome.actual, HealthStatus::healthy("ready"));

        // Message mismatch fails the case
        let fixture = Fixture::new(
            "ready",
            json!({ "status": { "ready": true } }),
            HealthStatus::healthy("all good"),
        );
        assert!(!run_fixture(&runtime, SCRIPT, false, &fixture).passed);
    }

    #[test]
    fn test_script_error_is_reported_as_unknown() {
        let fixture = Fixture::new("x", json!({}), HealthStatus::healthy(""));
        let outcome = run_fixture(&ScriptRuntime::default(), "return {", false, &fixture);
        assert!(!outcome.passed);
        assert_eq!(outcome.actual.status, HealthStatusCode::Unknown);
    }

    #[test]
    fn test_load_and_run_suite() {
        let dir = suite_dir();
        let suite = FixtureSuite::load(dir.path()).expect("load suite");
        assert_eq!(suite.fixtures.len(), 2);
        assert_eq!(suite.fixtures[0].name, "testdata/ready.yaml");

        let outcomes = suite.run(&ScriptRuntime::default());
        // The second case omits its message, so "waiting" does not match ""
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert_eq!(outcomes[1].actual, HealthStatus::progressing("waiting"));
    }

    #[test]
    fn test_missing_input_is_a_read_error() {
        let dir = suite_dir();
        fs::remove_file(dir.path().join("testdata/waiting.yaml")).expect("remove");
        assert!(matches!(
            FixtureSuite::load(dir.path()),
            Err(FixtureError::Read { .. })
        ));
    }

    #[test]
    fn test_malformed_index_is_a_parse_error() {
        let dir = suite_dir();
        write(dir.path(), TEST_INDEX_FILE, "tests: [ { healthStatus: { status: Great } } ]");
        assert!(matches!(
            FixtureSuite::load(dir.path()),
            Err(FixtureError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_finds_nested_suites() {
        let root = tempfile::tempdir().expect("tempdir");
        for kind in ["example.com/Widget", "example.com/Gadget"] {
            write(&root.path().join(kind), TEST_INDEX_FILE, "tests: []");
        }
        write(root.path(), "README.md", "not a suite");

        let found = discover(root.path()).expect("discover");
        assert_eq!(
            found,
            vec![
                root.path().join("example.com/Gadget"),
                root.path().join("example.com/Widget"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_symlinked_directories() {
        let root = tempfile::tempdir().expect("tempdir");
        write(&root.path().join("example.com/Widget"), TEST_INDEX_FILE, "tests: []");
        std::os::unix::fs::symlink(root.path(), root.path().join("example.com/loop"))
            .expect("symlink");
        std::os::unix::fs::symlink(
            root.path().join("example.com/Widget"),
            root.path().join("Widget-alias"),
        )
        .expect("symlink");

        let found = discover(root.path()).expect("discover");
        assert_eq!(found, vec![root.path().join("example.com/Widget")]);
    }
}
