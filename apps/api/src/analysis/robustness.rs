//! Robustness Checker: diagnostic audit of an already-accepted result.
//! Reports issues, never rejects.

use std::collections::HashSet;

use serde::Serialize;

use crate::analysis::contract::{
    CanonicalResult, Improvements, MAX_SCORE, MAX_SUMMARY_CHARS, MIN_SUMMARY_CHARS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RobustnessReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

pub fn audit(result: &CanonicalResult) -> RobustnessReport {
    let mut issues = Vec::new();

    for (field, score) in [
        ("match_score", result.match_score),
        ("ats_score", result.ats_score),
    ] {
        if score > MAX_SCORE {
            issues.push(format!("{field} out of range ({score})"));
        }
    }

    let summary_chars = result.role_fit_summary.chars().count();
    if summary_chars < MIN_SUMMARY_CHARS {
        issues.push(format!(
            "role_fit_summary too short (min {MIN_SUMMARY_CHARS} chars, got {summary_chars})"
        ));
    }
    if summary_chars > MAX_SUMMARY_CHARS {
        issues.push(format!(
            "role_fit_summary too long (max {MAX_SUMMARY_CHARS} chars, got {summary_chars})"
        ));
    }

    let mut lists: Vec<(&str, &[String])> = vec![
        ("missing_skills", result.missing_skills.as_slice()),
        ("resume_strengths", result.resume_strengths.as_slice()),
        ("keyword_analysis.present", result.keyword_analysis.present.as_slice()),
        ("keyword_analysis.missing", result.keyword_analysis.missing.as_slice()),
    ];
    if let Improvements::FreeText(items) = &result.improvements {
        lists.push(("improvements", items.as_slice()));
    }
    for (field, items) in lists {
        let blanks = items.iter().filter(|s| s.trim().is_empty()).count();
        if blanks > 0 {
            issues.push(format!("{field} has {blanks} blank entries"));
        }
    }

    let present: HashSet<String> = result
        .keyword_analysis
        .present
        .iter()
        .map(|k| k.to_lowercase())
        .collect();
    for keyword in &result.keyword_analysis.missing {
        if present.contains(&keyword.to_lowercase()) {
            issues.push(format!("keyword '{keyword}' is listed as both present and missing"));
        }
    }

    if let Improvements::Structured(items) = &result.improvements {
        for (index, item) in items.iter().enumerate() {
            if item.title.trim().is_empty() {
                issues.push(format!("improvements[{index}] has an empty title"));
            }
            if item.actionable.trim().is_empty() {
                issues.push(format!("improvements[{index}] has no actionable text"));
            }
        }
    }

    RobustnessReport {
        valid: issues.is_empty(),
        issues,
    }
}
