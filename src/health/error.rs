use thiserror::Error;

/// Failures while resolving or running a scripted health check
///
/// None of these escape the evaluator: they are reported as an Unknown
/// status carrying the error text as its message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("ambiguous health customizations for {key}: {patterns:?}")]
    ResolutionAmbiguous { key: String, patterns: Vec<String> },

    #[error("failed to parse health script: {0}")]
    ScriptParse(String),

    #[error("health script failed: {0}")]
    ScriptRuntime(String),

    #[error("health script exceeded its {0}")]
    ScriptTimeout(String),

    #[error("health script returned an invalid result: {0}")]
    InvalidReturnShape(String),

    #[error("health script returned unknown status {0:?}")]
    UnknownStatusLiteral(String),
}

impl EvaluationError {
    /// Short label for metrics and structured logs
    pub fn reason(&self) -> &'static str {
        match self {
            EvaluationError::ResolutionAmbiguous { .. } => "ambiguous",
            EvaluationError::ScriptParse(_) => "parse",
            EvaluationError::ScriptRuntime(_) => "runtime",
            EvaluationError::ScriptTimeout(_) => "timeout",
            EvaluationError::InvalidReturnShape(_) => "invalid_return",
            EvaluationError::UnknownStatusLiteral(_) => "unknown_status",
        }
    }
}
