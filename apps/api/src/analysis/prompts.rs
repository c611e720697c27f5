// Prompt constants and the prompt builder for resume analysis.

use std::borrow::Cow;

use crate::analysis::input::AnalysisInput;

/// Resume text beyond this many characters is cut before prompting.
pub const MAX_RESUME_CHARS: usize = 2500;
/// Job-description text beyond this many characters is cut before prompting.
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 1500;
/// Appended to any input that was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// System prompt. Enforces JSON-only output with the exact result keys.
pub const ANALYSIS_SYSTEM: &str = "You are a resume analysis inference engine. \
    Your only job is to output valid JSON.

CRITICAL RULES:
1. Output ONLY valid JSON. No markdown, no explanations, no code blocks.
2. Use EXACTLY these keys: match_score, missing_skills, ats_score, keyword_analysis, resume_strengths, improvements, role_fit_summary
3. All scores are integers 0-100
4. All arrays are arrays of strings (except keyword_analysis which has present/missing arrays)
5. role_fit_summary is a single string, 50-500 characters
6. Be conservative and realistic in scoring
7. Missing skills should be specific and actionable
8. Improvements should be concrete and prioritized

Your response must be parseable as JSON with no preprocessing.";

const ANALYSIS_PREAMBLE: &str = "Analyze this resume against the job description.";

const ANALYSIS_OUTPUT_FORMAT: &str = r#"Output JSON with this exact structure:
{
  "match_score": <0-100 integer>,
  "missing_skills": ["skill1", "skill2"],
  "ats_score": <0-100 integer>,
  "keyword_analysis": {
    "present": ["keyword1", "keyword2"],
    "missing": ["keyword3", "keyword4"]
  },
  "resume_strengths": ["strength1", "strength2"],
  "improvements": ["improvement1", "improvement2"],
  "role_fit_summary": "<50-500 character summary>"
}

Guidelines:
- match_score: Overall fit (0-100). Be conservative.
- missing_skills: Required skills not in resume. Be specific.
- ats_score: ATS compatibility (0-100). Consider formatting, keywords, structure.
- keyword_analysis: Extract important keywords from job description. Categorize as present/missing.
- resume_strengths: What makes this resume strong for this role.
- improvements: Prioritized, actionable improvements. Be concrete.
- role_fit_summary: Concise assessment of fit. Professional tone."#;

/// Renders the user prompt for one analysis. Pure and deterministic.
/// Inputs are spliced in by position; placeholder-like text inside them is left as-is.
pub fn build_analysis_prompt(input: &AnalysisInput) -> String {
    let resume = truncate_chars(input.resume_text(), MAX_RESUME_CHARS);
    let job_description = truncate_chars(input.job_description(), MAX_JOB_DESCRIPTION_CHARS);

    format!(
        "{ANALYSIS_PREAMBLE}\n\nRESUME:\n{resume}\n\nJOB DESCRIPTION:\n{job_description}\n\n{ANALYSIS_OUTPUT_FORMAT}"
    )
}

/// Keeps at most `max` characters, appending the truncation marker when cut.
pub fn truncate_chars(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}
