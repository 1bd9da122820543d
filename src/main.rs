use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::{DynamicObject, ResourceExt};
use kubehealth::fixtures::{discover, FixtureSuite};
use kubehealth::health::{aggregate, ChildHealth, ScriptRuntime};
use kubehealth::metrics::create_metrics;
use kubehealth::{CheckRegistry, Evaluator, HealthConfig, HealthStatus, ScriptLimits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Kubernetes resource health evaluation
#[derive(Debug, Parser)]
#[command(name = "kubehealth", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate resource manifests and their aggregate health
    Evaluate {
        /// ConfigMap manifest holding resource.customizations keys
        #[arg(short, long, env = "KUBEHEALTH_CONFIG")]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Print Prometheus metrics after the report
        #[arg(long)]
        metrics: bool,

        /// YAML manifests; multi-document files are allowed
        #[arg(required = true)]
        resources: Vec<PathBuf>,
    },

    /// Run health script fixture suites
    Test {
        /// Run scripts with every standard library available
        #[arg(long)]
        open_libs: bool,

        /// Suite directories, searched recursively for health_test.yaml
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// One evaluated resource in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReport {
    pub resource: String,
    #[serde(flatten)]
    pub health: HealthStatus,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub resources: Vec<ResourceReport>,
    pub aggregate: HealthStatus,
}

/// `<kind>/<namespace>/<name>`, namespace omitted for cluster-scoped resources
pub fn describe(obj: &DynamicObject) -> String {
    let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("?");
    match obj.namespace() {
        Some(namespace) => format!("{}/{}/{}", kind, namespace, obj.name_any()),
        None => format!("{}/{}", kind, obj.name_any()),
    }
}

/// Parse every YAML document in `contents`, skipping empty ones
pub fn parse_resources(contents: &str) -> anyhow::Result<Vec<DynamicObject>> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        resources.push(serde_yaml::from_value(value)?);
    }
    Ok(resources)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HealthConfig> {
    let Some(path) = path else {
        return Ok(HealthConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cm: ConfigMap = serde_yaml::from_str(&contents)
        .with_context(|| format!("{} is not a ConfigMap", path.display()))?;
    HealthConfig::from_config_map(&cm).with_context(|| format!("invalid config in {}", path.display()))
}

pub fn evaluate_all(
    evaluator: &Evaluator,
    config: &HealthConfig,
    resources: &[DynamicObject],
) -> EvaluationReport {
    let children: Vec<ChildHealth> = resources
        .iter()
        .map(|obj| evaluator.child_health(obj, config))
        .collect();

    let reports = resources
        .iter()
        .zip(&children)
        .map(|(obj, child)| ResourceReport {
            resource: describe(obj),
            health: child.health.clone(),
            ignored: child.ignore_health_check,
        })
        .collect();

    EvaluationReport {
        resources: reports,
        aggregate: aggregate(&children),
    }
}

pub fn render_text(report: &EvaluationReport) -> String {
    let mut out = String::new();
    for entry in &report.resources {
        let suffix = if entry.ignored { " (ignored)" } else { "" };
        out.push_str(&format!("{}: {}{}\n", entry.resource, entry.health, suffix));
    }
    out.push_str(&format!("aggregate: {}\n", report.aggregate));
    out
}

fn run_evaluate(
    config: Option<&Path>,
    output: OutputFormat,
    with_metrics: bool,
    paths: &[PathBuf],
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let metrics = create_metrics()?;
    let evaluator = Evaluator::new(
        CheckRegistry::with_builtins(),
        ScriptRuntime::new(ScriptLimits::from_env()?),
    )
    .with_metrics(metrics.clone());

    let mut resources = Vec::new();
    for path in paths {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = parse_resources(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        debug!(path = %path.display(), resources = parsed.len(), "Loaded manifests");
        resources.extend(parsed);
    }

    let report = evaluate_all(&evaluator, &config, &resources);
    match output {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    if with_metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

fn run_tests(open_libs: bool, roots: &[PathBuf]) -> anyhow::Result<()> {
    let runtime = ScriptRuntime::new(ScriptLimits::from_env()?);
    let mut passed = 0usize;
    let mut failed = 0usize;

    for root in roots {
        let dirs = discover(root)?;
        if dirs.is_empty() {
            warn!(path = %root.display(), "No fixture suites found");
        }
        for dir in dirs {
            let suite = FixtureSuite::load(&dir)?.with_open_libraries(open_libs);
            for outcome in suite.run(&runtime) {
                if outcome.passed {
                    passed += 1;
                    println!("ok   {} {}", dir.display(), outcome.name);
                } else {
                    failed += 1;
                    println!(
                        "FAIL {} {}\n     expected: {}\n     actual:   {}",
                        dir.display(),
                        outcome.name,
                        outcome.expected,
                        outcome.actual
                    );
                }
            }
        }
    }

    info!(passed, failed, "Fixture run finished");
    if failed > 0 {
        bail!("{} of {} fixtures failed", failed, passed + failed);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Evaluate {
            config,
            output,
            metrics,
            resources,
        } => run_evaluate(config.as_deref(), output, metrics, &resources),
        Command::Test { open_libs, dirs } => run_tests(open_libs, &dirs),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
