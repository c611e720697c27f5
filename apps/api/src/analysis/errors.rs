use thiserror::Error;

use crate::analysis::contract::ContractViolation;
use crate::llm_client::LlmError;

/// Every way the analysis pipeline can fail.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{field} must be at least {min} characters (got {actual})")]
    InputTooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("Model output is not valid JSON: {0}")]
    MalformedOutput(String),

    #[error("Model output violates the result contract: {}", join_violations(.0))]
    ContractViolation(Vec<ContractViolation>),

    #[error("Inference service error: {0}")]
    InferenceService(#[from] LlmError),

    #[error("No valid result after {attempts} attempts; last error: {last}")]
    InferenceExhausted {
        attempts: u32,
        last: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Only content problems are worth another inference call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::MalformedOutput(_) | AnalysisError::ContractViolation(_)
        )
    }

    /// Field paths named by a contract failure, for retry diagnostics.
    pub fn violated_fields(&self) -> Vec<&str> {
        match self {
            AnalysisError::ContractViolation(violations) => {
                violations.iter().map(|v| v.field.as_str()).collect()
            }
            AnalysisError::InferenceExhausted { last, .. } => last.violated_fields(),
            _ => vec![],
        }
    }
}

fn join_violations(violations: &[ContractViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
