//! Retry Controller: the one-shot analysis path.
//!
//! Flow per attempt: inference call → strip fences → JSON parse → contract check.
//! Parse and contract failures are retried up to the configured bound;
//! transport/service failures propagate immediately without a retry.
//! Attempts run strictly one after another.

use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::contract::{self, CanonicalResult};
use crate::analysis::errors::AnalysisError;
use crate::analysis::input::AnalysisInput;
use crate::analysis::prompts::{build_analysis_prompt, ANALYSIS_SYSTEM};
use crate::llm_client::{clean_json_content, InferenceService, SamplingConfig};

/// Default number of retries beyond the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Runs a one-shot analysis with the default retry bound.
pub async fn analyze(
    service: &dyn InferenceService,
    input: &AnalysisInput,
) -> Result<CanonicalResult, AnalysisError> {
    analyze_with_retries(service, input, MAX_RETRIES).await
}

/// Runs a one-shot analysis, issuing at most `1 + max_retries` inference calls.
pub async fn analyze_with_retries(
    service: &dyn InferenceService,
    input: &AnalysisInput,
    max_retries: u32,
) -> Result<CanonicalResult, AnalysisError> {
    let prompt = build_analysis_prompt(input);
    let sampling = SamplingConfig::default();
    let max_attempts = max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let raw = service.complete(ANALYSIS_SYSTEM, &prompt, &sampling).await?;

        let err = match parse_and_validate(&raw) {
            Ok(result) => {
                info!(
                    "Analysis succeeded on attempt {}: match_score={}, ats_score={}",
                    attempt, result.match_score, result.ats_score
                );
                return Ok(result);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(AnalysisError::InferenceExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        match &err {
            AnalysisError::ContractViolation(_) => warn!(
                "Analysis attempt {}/{}: contract violated at [{}], retrying",
                attempt,
                max_attempts,
                err.violated_fields().join(", ")
            ),
            _ => warn!(
                "Analysis attempt {}/{}: {}, retrying",
                attempt, max_attempts, err
            ),
        }
    }
}

/// Cleans raw model text, parses it, and validates it against the contract.
pub fn parse_and_validate(raw: &str) -> Result<CanonicalResult, AnalysisError> {
    let cleaned = clean_json_content(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AnalysisError::MalformedOutput(e.to_string()))?;
    contract::validate(&value).map_err(AnalysisError::ContractViolation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::contract::Improvements;
    use crate::llm_client::mock::MockInference;
    use crate::llm_client::LlmError;

    const VALID: &str = r#"{"match_score":82,"missing_skills":["Kubernetes"],"ats_score":75,"keyword_analysis":{"present":["Python"],"missing":["Kubernetes"]},"resume_strengths":["5 years experience"],"improvements":["Add Kubernetes experience"],"role_fit_summary":"Solid backend profile; Kubernetes is the notable gap."}"#;

    fn input() -> AnalysisInput {
        AnalysisInput::new("r".repeat(120), "j".repeat(60)).unwrap()
    }

    fn ok(text: &str) -> Result<String, LlmError> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn test_valid_output_returns_exact_values() {
        let service = MockInference::with_completions([ok(VALID)]);
        let result = analyze(&service, &input()).await.unwrap();

        assert_eq!(result.match_score, 82);
        assert_eq!(result.ats_score, 75);
        assert_eq!(result.missing_skills, vec!["Kubernetes"]);
        assert_eq!(
            result.improvements,
            Improvements::FreeText(vec!["Add Kubernetes experience".to_string()])
        );
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_fenced_output_parses_without_retry() {
        let fenced = format!("```json\n{VALID}\n```");
        let service = MockInference::with_completions([ok(&fenced)]);
        let result = analyze(&service, &input()).await.unwrap();
        assert_eq!(result.match_score, 82);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_two_malformed_then_valid_makes_three_calls() {
        let service = MockInference::with_completions([
            ok("{\"match_score\": 82,"),
            ok("not json at all"),
            ok(VALID),
        ]);
        let result = analyze_with_retries(&service, &input(), 3).await.unwrap();
        assert_eq!(result.ats_score, 75);
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn test_contract_violation_is_retried() {
        let service = MockInference::with_completions([
            ok(r#"{"match_score": 500}"#),
            ok(VALID),
        ]);
        assert!(analyze(&service, &input()).await.is_ok());
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_after_one_plus_max_retries_calls() {
        let service = MockInference::with_completions((0..10).map(|_| ok("garbage")));
        let err = analyze_with_retries(&service, &input(), 3).await.unwrap_err();

        assert_eq!(service.calls(), 4);
        match err {
            AnalysisError::InferenceExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, AnalysisError::MalformedOutput(_)));
            }
            other => panic!("expected InferenceExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_carries_violated_fields() {
        let service =
            MockInference::with_completions((0..2).map(|_| ok(r#"{"match_score": 50}"#)));
        let err = analyze_with_retries(&service, &input(), 1).await.unwrap_err();

        assert_eq!(service.calls(), 2);
        let fields = err.violated_fields();
        assert!(fields.contains(&"ats_score"));
        assert!(fields.contains(&"role_fit_summary"));
    }

    #[tokio::test]
    async fn test_zero_retries_makes_single_call() {
        let service = MockInference::with_completions([ok("nope"), ok(VALID)]);
        let err = analyze_with_retries(&service, &input(), 0).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InferenceExhausted { attempts: 1, .. }));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_service_error_is_not_retried() {
        let service = MockInference::with_completions([
            Err(LlmError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
            ok(VALID),
        ]);
        let err = analyze(&service, &input()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InferenceService(LlmError::Api { status: 503, .. })
        ));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_service_error_after_malformed_output_stops_immediately() {
        let service = MockInference::with_completions([
            ok("garbage"),
            Err(LlmError::EmptyContent),
            ok(VALID),
        ]);
        let err = analyze(&service, &input()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InferenceService(_)));
        assert_eq!(service.calls(), 2);
    }

    #[test]
    fn test_parse_and_validate_distinguishes_error_kinds() {
        assert!(matches!(
            parse_and_validate("{oops"),
            Err(AnalysisError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_and_validate("{}"),
            Err(AnalysisError::ContractViolation(v)) if v.len() == 7
        ));
    }
}
