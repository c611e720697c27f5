//! Output Contract: the strict shape every accepted analysis result must have.
//!
//! # Contract rules
//! - `match_score`, `ats_score`: integers in [0, 100]
//! - `missing_skills`, `resume_strengths`: arrays of strings (possibly empty)
//! - `keyword_analysis.present`, `keyword_analysis.missing`: arrays of strings
//! - `improvements`: either all strings or all structured improvement objects
//! - `role_fit_summary`: 50 – 500 characters
//!
//! `validate` collects every violation rather than stopping at the first one,
//! so a retry can report exactly what the model got wrong.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_SCORE: u8 = 100;
pub const MIN_SUMMARY_CHARS: usize = 50;
pub const MAX_SUMMARY_CHARS: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Result types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordAnalysis {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImprovementCategory {
    Skills,
    Experience,
    Keywords,
    Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Forward-compatible improvement shape: the model classifies it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredImprovement {
    pub category: ImprovementCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub actionable: String,
}

/// The two accepted representations of `improvements`. A single result never mixes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Improvements {
    FreeText(Vec<String>),
    Structured(Vec<StructuredImprovement>),
}

impl Improvements {
    pub fn len(&self) -> usize {
        match self {
            Improvements::FreeText(items) => items.len(),
            Improvements::Structured(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Improvements {
    fn default() -> Self {
        Improvements::FreeText(Vec::new())
    }
}

/// A contract-valid analysis result. The pipeline only produces these via [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalResult {
    pub match_score: u8,
    pub ats_score: u8,
    pub missing_skills: Vec<String>,
    pub keyword_analysis: KeywordAnalysis,
    pub resume_strengths: Vec<String>,
    pub improvements: Improvements,
    pub role_fit_summary: String,
}

/// One broken rule: the offending field path and what was wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolation {
    pub field: String,
    pub message: String,
}

impl ContractViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire keys
// ────────────────────────────────────────────────────────────────────────────

/// A top-level wire key plus the camelCase spelling accepted in its place.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Key {
    pub(crate) wire: &'static str,
    pub(crate) alias: &'static str,
}

impl Key {
    pub(crate) fn lookup<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        object.get(self.wire).or_else(|| object.get(self.alias))
    }
}

pub(crate) const MATCH_SCORE: Key = Key {
    wire: "match_score",
    alias: "matchScore",
};
pub(crate) const ATS_SCORE: Key = Key {
    wire: "ats_score",
    alias: "atsScore",
};
pub(crate) const MISSING_SKILLS: Key = Key {
    wire: "missing_skills",
    alias: "missingSkills",
};
pub(crate) const KEYWORD_ANALYSIS: Key = Key {
    wire: "keyword_analysis",
    alias: "keywordAnalysis",
};
pub(crate) const RESUME_STRENGTHS: Key = Key {
    wire: "resume_strengths",
    alias: "resumeStrengths",
};
pub(crate) const IMPROVEMENTS: Key = Key {
    wire: "improvements",
    alias: "improvements",
};
pub(crate) const ROLE_FIT_SUMMARY: Key = Key {
    wire: "role_fit_summary",
    alias: "roleFitSummary",
};

// ────────────────────────────────────────────────────────────────────────────
// Strict validation
// ────────────────────────────────────────────────────────────────────────────

/// Validates a parsed candidate against the contract.
pub fn validate(candidate: &Value) -> Result<CanonicalResult, Vec<ContractViolation>> {
    let Some(object) = candidate.as_object() else {
        return Err(vec![ContractViolation::new(
            "$",
            format!("expected a JSON object, got {}", type_name(candidate)),
        )]);
    };

    let mut violations = Vec::new();

    let match_score = check_score(object, MATCH_SCORE, &mut violations);
    let ats_score = check_score(object, ATS_SCORE, &mut violations);
    let missing_skills = check_string_list(
        MISSING_SKILLS.lookup(object),
        MISSING_SKILLS.wire,
        &mut violations,
    );
    let keyword_analysis = check_keyword_analysis(object, &mut violations);
    let resume_strengths = check_string_list(
        RESUME_STRENGTHS.lookup(object),
        RESUME_STRENGTHS.wire,
        &mut violations,
    );
    let improvements = check_improvements(object, &mut violations);
    let role_fit_summary = check_summary(object, &mut violations);

    match (
        match_score,
        ats_score,
        missing_skills,
        keyword_analysis,
        resume_strengths,
        improvements,
        role_fit_summary,
    ) {
        (
            Some(match_score),
            Some(ats_score),
            Some(missing_skills),
            Some(keyword_analysis),
            Some(resume_strengths),
            Some(improvements),
            Some(role_fit_summary),
        ) if violations.is_empty() => Ok(CanonicalResult {
            match_score,
            ats_score,
            missing_skills,
            keyword_analysis,
            resume_strengths,
            improvements,
            role_fit_summary,
        }),
        _ => Err(violations),
    }
}

fn required(field: &str) -> ContractViolation {
    ContractViolation::new(field, "is required")
}

fn check_score(
    object: &Map<String, Value>,
    key: Key,
    violations: &mut Vec<ContractViolation>,
) -> Option<u8> {
    let Some(value) = key.lookup(object) else {
        violations.push(required(key.wire));
        return None;
    };

    match value.as_f64() {
        None => {
            violations.push(ContractViolation::new(
                key.wire,
                format!("expected an integer, got {}", type_name(value)),
            ));
            None
        }
        Some(n) if n.fract() != 0.0 => {
            violations.push(ContractViolation::new(
                key.wire,
                format!("expected an integer, got {n}"),
            ));
            None
        }
        Some(n) if !(0.0..=f64::from(MAX_SCORE)).contains(&n) => {
            violations.push(ContractViolation::new(
                key.wire,
                format!("must be between 0 and {MAX_SCORE} (got {n})"),
            ));
            None
        }
        Some(n) => Some(n as u8),
    }
}

fn check_string_list(
    value: Option<&Value>,
    field: &str,
    violations: &mut Vec<ContractViolation>,
) -> Option<Vec<String>> {
    let Some(value) = value else {
        violations.push(required(field));
        return None;
    };
    let Some(items) = value.as_array() else {
        violations.push(ContractViolation::new(
            field,
            format!("expected an array of strings, got {}", type_name(value)),
        ));
        return None;
    };

    let mut strings = Vec::with_capacity(items.len());
    let mut all_strings = true;
    for (index, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s.to_string()),
            None => {
                all_strings = false;
                violations.push(ContractViolation::new(
                    format!("{field}[{index}]"),
                    format!("expected a string, got {}", type_name(item)),
                ));
            }
        }
    }

    all_strings.then_some(strings)
}

fn check_keyword_analysis(
    object: &Map<String, Value>,
    violations: &mut Vec<ContractViolation>,
) -> Option<KeywordAnalysis> {
    let field = KEYWORD_ANALYSIS.wire;
    let Some(value) = KEYWORD_ANALYSIS.lookup(object) else {
        violations.push(required(field));
        return None;
    };
    let Some(inner) = value.as_object() else {
        violations.push(ContractViolation::new(
            field,
            format!("expected an object, got {}", type_name(value)),
        ));
        return None;
    };

    let present = check_string_list(inner.get("present"), &format!("{field}.present"), violations);
    let missing = check_string_list(inner.get("missing"), &format!("{field}.missing"), violations);

    Some(KeywordAnalysis {
        present: present?,
        missing: missing?,
    })
}

fn check_improvements(
    object: &Map<String, Value>,
    violations: &mut Vec<ContractViolation>,
) -> Option<Improvements> {
    let field = IMPROVEMENTS.wire;
    let Some(value) = IMPROVEMENTS.lookup(object) else {
        violations.push(required(field));
        return None;
    };
    let Some(items) = value.as_array() else {
        violations.push(ContractViolation::new(
            field,
            format!("expected an array, got {}", type_name(value)),
        ));
        return None;
    };

    // The first entry decides the representation; the rest must agree with it.
    match items.first() {
        None => Some(Improvements::default()),
        Some(Value::String(_)) => {
            check_string_list(Some(value), field, violations).map(Improvements::FreeText)
        }
        Some(Value::Object(_)) => {
            let mut structured = Vec::with_capacity(items.len());
            let mut all_valid = true;
            for (index, item) in items.iter().enumerate() {
                match serde_json::from_value::<StructuredImprovement>(item.clone()) {
                    Ok(improvement) => structured.push(improvement),
                    Err(e) => {
                        all_valid = false;
                        violations.push(ContractViolation::new(
                            format!("{field}[{index}]"),
                            format!("expected an improvement object: {e}"),
                        ));
                    }
                }
            }
            all_valid.then_some(Improvements::Structured(structured))
        }
        Some(other) => {
            violations.push(ContractViolation::new(
                format!("{field}[0]"),
                format!(
                    "expected a string or an improvement object, got {}",
                    type_name(other)
                ),
            ));
            None
        }
    }
}

fn check_summary(
    object: &Map<String, Value>,
    violations: &mut Vec<ContractViolation>,
) -> Option<String> {
    let field = ROLE_FIT_SUMMARY.wire;
    let Some(value) = ROLE_FIT_SUMMARY.lookup(object) else {
        violations.push(required(field));
        return None;
    };
    let Some(summary) = value.as_str() else {
        violations.push(ContractViolation::new(
            field,
            format!("expected a string, got {}", type_name(value)),
        ));
        return None;
    };

    let length = summary.chars().count();
    if !(MIN_SUMMARY_CHARS..=MAX_SUMMARY_CHARS).contains(&length) {
        violations.push(ContractViolation::new(
            field,
            format!(
                "length must be between {MIN_SUMMARY_CHARS} and {MAX_SUMMARY_CHARS} characters (got {length})"
            ),
        ));
        return None;
    }

    Some(summary.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient readers (partial results only, never used for acceptance)
// ────────────────────────────────────────────────────────────────────────────

pub(crate) fn lenient_score(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn lenient_string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    })
}

pub(crate) fn lenient_keyword_analysis(value: &Value) -> Option<KeywordAnalysis> {
    let inner = value.as_object()?;
    Some(KeywordAnalysis {
        present: inner
            .get("present")
            .and_then(lenient_string_list)
            .unwrap_or_default(),
        missing: inner
            .get("missing")
            .and_then(lenient_string_list)
            .unwrap_or_default(),
    })
}

pub(crate) fn lenient_improvements(value: &Value) -> Option<Improvements> {
    let items = value.as_array()?;
    if items.iter().any(Value::is_object) {
        let structured = items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect();
        Some(Improvements::Structured(structured))
    } else {
        lenient_string_list(value).map(Improvements::FreeText)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUMMARY: &str = "Strong Python background; lacks Kubernetes exposure.";

    fn valid_candidate() -> Value {
        json!({
            "match_score": 82,
            "missing_skills": ["Kubernetes"],
            "ats_score": 75,
            "keyword_analysis": {"present": ["Python"], "missing": ["Kubernetes"]},
            "resume_strengths": ["5 years experience"],
            "improvements": ["Add Kubernetes experience"],
            "role_fit_summary": SUMMARY
        })
    }

    fn fields(violations: &[ContractViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_valid_candidate_produces_exact_values() {
        let result = validate(&valid_candidate()).unwrap();
        assert_eq!(result.match_score, 82);
        assert_eq!(result.ats_score, 75);
        assert_eq!(result.missing_skills, vec!["Kubernetes"]);
        assert_eq!(result.keyword_analysis.present, vec!["Python"]);
        assert_eq!(result.keyword_analysis.missing, vec!["Kubernetes"]);
        assert_eq!(result.resume_strengths, vec!["5 years experience"]);
        assert_eq!(
            result.improvements,
            Improvements::FreeText(vec!["Add Kubernetes experience".to_string()])
        );
        assert_eq!(result.role_fit_summary, SUMMARY);
    }

    #[test]
    fn test_empty_arrays_are_allowed() {
        let mut candidate = valid_candidate();
        candidate["missing_skills"] = json!([]);
        candidate["resume_strengths"] = json!([]);
        candidate["improvements"] = json!([]);
        candidate["keyword_analysis"] = json!({"present": [], "missing": []});
        let result = validate(&candidate).unwrap();
        assert!(result.improvements.is_empty());
    }

    #[test]
    fn test_collects_all_violations() {
        let candidate = json!({
            "match_score": 140,
            "ats_score": "high",
            "missing_skills": "Kubernetes",
            "keyword_analysis": {"present": ["Python", 3]},
            "improvements": ["ok"],
            "role_fit_summary": "too short"
        });
        let violations = validate(&candidate).unwrap_err();
        let fields = fields(&violations);
        assert_eq!(
            fields,
            vec![
                "match_score",
                "ats_score",
                "missing_skills",
                "keyword_analysis.present[1]",
                "keyword_analysis.missing",
                "resume_strengths",
                "role_fit_summary",
            ]
        );
    }

    #[test]
    fn test_score_out_of_range_is_reported_with_value() {
        let mut candidate = valid_candidate();
        candidate["ats_score"] = json!(101);
        let violations = validate(&candidate).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("got 101"));
    }

    #[test]
    fn test_negative_score_rejected() {
        let mut candidate = valid_candidate();
        candidate["match_score"] = json!(-1);
        assert_eq!(fields(&validate(&candidate).unwrap_err()), vec!["match_score"]);
    }

    #[test]
    fn test_fractional_score_rejected_but_integral_float_accepted() {
        let mut candidate = valid_candidate();
        candidate["match_score"] = json!(82.5);
        assert!(validate(&candidate).is_err());

        candidate["match_score"] = json!(82.0);
        assert_eq!(validate(&candidate).unwrap().match_score, 82);
    }

    #[test]
    fn test_score_bounds_are_inclusive() {
        let mut candidate = valid_candidate();
        candidate["match_score"] = json!(0);
        candidate["ats_score"] = json!(100);
        let result = validate(&candidate).unwrap();
        assert_eq!((result.match_score, result.ats_score), (0, 100));
    }

    #[test]
    fn test_summary_length_bounds() {
        let mut candidate = valid_candidate();
        candidate["role_fit_summary"] = json!("x".repeat(MIN_SUMMARY_CHARS));
        assert!(validate(&candidate).is_ok());

        candidate["role_fit_summary"] = json!("x".repeat(MAX_SUMMARY_CHARS));
        assert!(validate(&candidate).is_ok());

        candidate["role_fit_summary"] = json!("x".repeat(MIN_SUMMARY_CHARS - 1));
        assert!(validate(&candidate).is_err());

        candidate["role_fit_summary"] = json!("x".repeat(MAX_SUMMARY_CHARS + 1));
        assert!(validate(&candidate).is_err());
    }

    #[test]
    fn test_structured_improvements_accepted() {
        let mut candidate = valid_candidate();
        candidate["improvements"] = json!([{
            "category": "keywords",
            "priority": "high",
            "title": "Mirror the JD",
            "description": "Several required keywords are absent.",
            "actionable": "Add Kubernetes and Terraform to the skills section."
        }]);
        let result = validate(&candidate).unwrap();
        match result.improvements {
            Improvements::Structured(items) => {
                assert_eq!(items[0].category, ImprovementCategory::Keywords);
                assert_eq!(items[0].priority, Priority::High);
            }
            other => panic!("expected structured improvements, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_improvements_rejected() {
        let mut candidate = valid_candidate();
        candidate["improvements"] = json!(["Add metrics", {"category": "skills"}]);
        assert_eq!(
            fields(&validate(&candidate).unwrap_err()),
            vec!["improvements[1]"]
        );
    }

    #[test]
    fn test_structured_improvement_with_unknown_category_rejected() {
        let mut candidate = valid_candidate();
        candidate["improvements"] = json!([{
            "category": "vibes",
            "priority": "high",
            "title": "t",
            "description": "d",
            "actionable": "a"
        }]);
        assert_eq!(
            fields(&validate(&candidate).unwrap_err()),
            vec!["improvements[0]"]
        );
    }

    #[test]
    fn test_camel_case_keys_accepted() {
        let candidate = json!({
            "matchScore": 60,
            "atsScore": 55,
            "missingSkills": [],
            "keywordAnalysis": {"present": [], "missing": []},
            "resumeStrengths": [],
            "improvements": [],
            "roleFitSummary": SUMMARY
        });
        let result = validate(&candidate).unwrap();
        assert_eq!(result.match_score, 60);
    }

    #[test]
    fn test_non_object_rejected() {
        let violations = validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(fields(&violations), vec!["$"]);
    }

    #[test]
    fn test_canonical_result_serializes_wire_keys() {
        let result = validate(&valid_candidate()).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, valid_candidate());
    }

    #[test]
    fn test_lenient_improvements_prefers_structured_when_objects_present() {
        let value = json!([{
            "category": "skills",
            "priority": "low",
            "title": "t",
            "description": "d",
            "actionable": "a"
        }, {"category": "incomplete"}]);
        match lenient_improvements(&value) {
            Some(Improvements::Structured(items)) => assert_eq!(items.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
