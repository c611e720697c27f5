//! Legacy Adapter: denormalizes a canonical result into the shape older
//! presentation consumers expect.
//!
//! Total and pure: every `CanonicalResult` maps to a `LegacyResult`, and the
//! same input always maps to an equal output.
//!
//! Free-text improvements go through an [`ImprovementClassifier`]; structured
//! ones are passed through untouched.

use serde::Serialize;

use crate::analysis::contract::{
    CanonicalResult, ImprovementCategory, Improvements, Priority, StructuredImprovement,
};

/// Importance given to every skill gap; the canonical result carries no weighting.
pub const DEFAULT_SKILL_IMPORTANCE: f32 = 0.7;

const TITLE_MAX_CHARS: usize = 50;
const FALLBACK_TITLE: &str = "Improvement";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResult {
    pub match_score: u8,
    pub ats_score: u8,
    pub skill_gaps: Vec<SkillGap>,
    pub keywords: Vec<KeywordMatch>,
    pub improvements: Vec<StructuredImprovement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillGap {
    pub skill: String,
    pub required: bool,
    pub present: bool,
    pub importance: f32,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCategory {
    Technical,
    Soft,
    Industry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub count: u32,
    pub category: KeywordCategory,
    pub matched: bool,
}

/// Assigns a category and priority to a free-text improvement.
/// `index` is the improvement's position in the result's list.
pub trait ImprovementClassifier {
    fn classify(&self, text: &str, index: usize) -> (ImprovementCategory, Priority);
}

/// Case-insensitive substring cues.
///
/// Category: "skill" → skills, "keyword" → keywords, "format" → formatting,
/// otherwise experience. Priority: high on "critical"/"important" or for the
/// first two entries, medium for the next two, low after that.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCueClassifier;

impl ImprovementClassifier for KeywordCueClassifier {
    fn classify(&self, text: &str, index: usize) -> (ImprovementCategory, Priority) {
        let lower = text.to_lowercase();

        let category = if lower.contains("skill") {
            ImprovementCategory::Skills
        } else if lower.contains("keyword") {
            ImprovementCategory::Keywords
        } else if lower.contains("format") {
            ImprovementCategory::Formatting
        } else {
            ImprovementCategory::Experience
        };

        let urgent = lower.contains("critical") || lower.contains("important");
        let priority = if urgent || index < 2 {
            Priority::High
        } else if index < 4 {
            Priority::Medium
        } else {
            Priority::Low
        };

        (category, priority)
    }
}

/// Converts with the default keyword-cue classifier.
pub fn to_legacy(result: &CanonicalResult) -> LegacyResult {
    to_legacy_with(result, &KeywordCueClassifier)
}

pub fn to_legacy_with(
    result: &CanonicalResult,
    classifier: &dyn ImprovementClassifier,
) -> LegacyResult {
    let skill_gaps = result
        .missing_skills
        .iter()
        .map(|skill| SkillGap {
            skill: skill.clone(),
            required: true,
            present: false,
            importance: DEFAULT_SKILL_IMPORTANCE,
        })
        .collect();

    let present = result
        .keyword_analysis
        .present
        .iter()
        .map(|keyword| keyword_match(keyword, true));
    let missing = result
        .keyword_analysis
        .missing
        .iter()
        .map(|keyword| keyword_match(keyword, false));

    let improvements = match &result.improvements {
        Improvements::Structured(items) => items.clone(),
        Improvements::FreeText(items) => items
            .iter()
            .enumerate()
            .map(|(index, text)| classify_free_text(classifier, text, index))
            .collect(),
    };

    LegacyResult {
        match_score: result.match_score,
        ats_score: result.ats_score,
        skill_gaps,
        keywords: present.chain(missing).collect(),
        improvements,
    }
}

fn keyword_match(keyword: &str, matched: bool) -> KeywordMatch {
    KeywordMatch {
        keyword: keyword.to_string(),
        count: u32::from(matched),
        category: KeywordCategory::Technical,
        matched,
    }
}

fn classify_free_text(
    classifier: &dyn ImprovementClassifier,
    text: &str,
    index: usize,
) -> StructuredImprovement {
    let (category, priority) = classifier.classify(text, index);
    let title: String = text.chars().take(TITLE_MAX_CHARS).collect();

    StructuredImprovement {
        category,
        priority,
        title: if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            title
        },
        description: text.to_string(),
        actionable: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::contract::KeywordAnalysis;

    fn result(improvements: Improvements) -> CanonicalResult {
        CanonicalResult {
            match_score: 82,
            ats_score: 75,
            missing_skills: vec!["Kubernetes".to_string()],
            keyword_analysis: KeywordAnalysis {
                present: vec!["Python".to_string()],
                missing: vec!["Kubernetes".to_string()],
            },
            resume_strengths: vec!["5 years experience".to_string()],
            improvements,
            role_fit_summary: "Solid backend profile; Kubernetes is the notable gap.".to_string(),
        }
    }

    fn free_text(items: &[&str]) -> Improvements {
        Improvements::FreeText(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_skill_gaps_and_keywords() {
        let legacy = to_legacy(&result(free_text(&["Add Kubernetes experience"])));

        assert_eq!((legacy.match_score, legacy.ats_score), (82, 75));
        assert_eq!(
            legacy.skill_gaps,
            vec![SkillGap {
                skill: "Kubernetes".to_string(),
                required: true,
                present: false,
                importance: DEFAULT_SKILL_IMPORTANCE,
            }]
        );
        assert_eq!(
            legacy.keywords,
            vec![
                KeywordMatch {
                    keyword: "Python".to_string(),
                    count: 1,
                    category: KeywordCategory::Technical,
                    matched: true,
                },
                KeywordMatch {
                    keyword: "Kubernetes".to_string(),
                    count: 0,
                    category: KeywordCategory::Technical,
                    matched: false,
                },
            ]
        );
    }

    #[test]
    fn test_free_text_categories() {
        let legacy = to_legacy(&result(free_text(&[
            "Highlight your SKILLS section",
            "Mirror keywords from the posting",
            "Fix the formatting of dates",
            "Add Kubernetes experience",
        ])));
        let categories: Vec<_> = legacy.improvements.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                ImprovementCategory::Skills,
                ImprovementCategory::Keywords,
                ImprovementCategory::Formatting,
                ImprovementCategory::Experience,
            ]
        );
    }

    #[test]
    fn test_free_text_priorities_by_position_and_urgency() {
        let legacy = to_legacy(&result(free_text(&[
            "one", "two", "three", "four", "five", "This is critical", "Important too",
        ])));
        let priorities: Vec<_> = legacy.improvements.iter().map(|i| i.priority).collect();
        assert_eq!(
            priorities,
            vec![
                Priority::High,
                Priority::High,
                Priority::Medium,
                Priority::Medium,
                Priority::Low,
                Priority::High,
                Priority::High,
            ]
        );
    }

    #[test]
    fn test_title_is_first_fifty_chars_or_fallback() {
        let long = "x".repeat(80);
        let legacy = to_legacy(&result(free_text(&[&long, ""])));

        assert_eq!(legacy.improvements[0].title, "x".repeat(50));
        assert_eq!(legacy.improvements[0].description, long);
        assert_eq!(legacy.improvements[0].actionable, long);
        assert_eq!(legacy.improvements[1].title, "Improvement");
        assert_eq!(legacy.improvements[1].description, "");
    }

    #[test]
    fn test_structured_improvements_pass_through() {
        let item = StructuredImprovement {
            category: ImprovementCategory::Formatting,
            priority: Priority::Low,
            title: "Critical skill gap".to_string(),
            description: "Worded to trip every cue".to_string(),
            actionable: "Leave as-is".to_string(),
        };
        let legacy = to_legacy(&result(Improvements::Structured(vec![item.clone()])));
        assert_eq!(legacy.improvements, vec![item]);
    }

    #[test]
    fn test_custom_classifier_is_used_for_free_text() {
        struct Everything;
        impl ImprovementClassifier for Everything {
            fn classify(&self, _text: &str, _index: usize) -> (ImprovementCategory, Priority) {
                (ImprovementCategory::Keywords, Priority::Low)
            }
        }

        let legacy = to_legacy_with(&result(free_text(&["critical skill"])), &Everything);
        assert_eq!(legacy.improvements[0].category, ImprovementCategory::Keywords);
        assert_eq!(legacy.improvements[0].priority, Priority::Low);
    }

    #[test]
    fn test_empty_result_still_converts() {
        let empty = CanonicalResult {
            match_score: 0,
            ats_score: 0,
            missing_skills: vec![],
            keyword_analysis: KeywordAnalysis::default(),
            resume_strengths: vec![],
            improvements: Improvements::default(),
            role_fit_summary: String::new(),
        };
        let legacy = to_legacy(&empty);
        assert!(legacy.skill_gaps.is_empty());
        assert!(legacy.keywords.is_empty());
        assert!(legacy.improvements.is_empty());
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let input = result(free_text(&["Add Kubernetes experience", "Reformat dates"]));
        assert_eq!(to_legacy(&input), to_legacy(&input));
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let json = serde_json::to_value(to_legacy(&result(free_text(&["Add skills"])))).unwrap();
        assert_eq!(json["matchScore"], 82);
        assert_eq!(json["skillGaps"][0]["required"], true);
        assert_eq!(json["keywords"][0]["category"], "technical");
        assert_eq!(json["improvements"][0]["category"], "skills");
        assert_eq!(json["improvements"][0]["priority"], "high");
    }
}
