//! Streaming Decoder: turns inference text fragments into best-effort partial
//! results while a session is in flight, then one contract-valid final result.
//!
//! Per fragment:
//! 1. Append to the session buffer.
//! 2. Try a full JSON parse of the cleaned buffer; on failure fall back to
//!    pattern extraction (scores by regex, array keys as empty placeholders).
//! 3. Emit the candidate only if it is meaningfully different from the last
//!    emitted partial.
//!
//! At end of stream the whole buffer is parsed and validated once. There is no
//! retry here: a new attempt means a new inference session, which is the
//! caller's decision.

use std::sync::{Arc, OnceLock};

use futures::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::analysis::contract::{
    lenient_improvements, lenient_keyword_analysis, lenient_score, lenient_string_list,
    CanonicalResult, Improvements, Key, KeywordAnalysis, ATS_SCORE, IMPROVEMENTS,
    KEYWORD_ANALYSIS, MATCH_SCORE, MISSING_SKILLS, RESUME_STRENGTHS, ROLE_FIT_SUMMARY,
};
use crate::analysis::errors::AnalysisError;
use crate::analysis::input::AnalysisInput;
use crate::analysis::orchestrator::parse_and_validate;
use crate::analysis::prompts::{build_analysis_prompt, ANALYSIS_SYSTEM};
use crate::llm_client::{clean_json_content, FragmentStream, InferenceService, SamplingConfig};

// ────────────────────────────────────────────────────────────────────────────
// Partial result
// ────────────────────────────────────────────────────────────────────────────

/// Best-effort snapshot of a result that is still arriving. Never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ats_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_analysis: Option<KeywordAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_strengths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvements: Option<Improvements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_fit_summary: Option<String>,
}

impl PartialResult {
    /// Derives the best available snapshot from everything received so far.
    pub fn from_buffer(buffer: &str) -> Self {
        match serde_json::from_str::<Value>(clean_json_content(buffer)) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::extract(buffer),
        }
    }

    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        Self {
            match_score: MATCH_SCORE.lookup(object).and_then(lenient_score),
            ats_score: ATS_SCORE.lookup(object).and_then(lenient_score),
            missing_skills: MISSING_SKILLS.lookup(object).and_then(lenient_string_list),
            keyword_analysis: KEYWORD_ANALYSIS
                .lookup(object)
                .and_then(lenient_keyword_analysis),
            resume_strengths: RESUME_STRENGTHS.lookup(object).and_then(lenient_string_list),
            improvements: IMPROVEMENTS.lookup(object).and_then(lenient_improvements),
            role_fit_summary: ROLE_FIT_SUMMARY
                .lookup(object)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Pattern extraction over text that does not parse yet.
    ///
    /// Array fields only record that their key has appeared; their content
    /// shows up once the whole buffer parses.
    fn extract(buffer: &str) -> Self {
        Self {
            match_score: capture_score(match_score_pattern(), buffer),
            ats_score: capture_score(ats_score_pattern(), buffer),
            missing_skills: key_seen(buffer, MISSING_SKILLS).then(Vec::new),
            keyword_analysis: key_seen(buffer, KEYWORD_ANALYSIS).then(KeywordAnalysis::default),
            resume_strengths: key_seen(buffer, RESUME_STRENGTHS).then(Vec::new),
            improvements: key_seen(buffer, IMPROVEMENTS).then(Improvements::default),
            role_fit_summary: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The meaningfulness test.
    ///
    /// Against a previous emission: a present score differs, any array grew,
    /// or the summary appeared or changed. With no previous emission, any
    /// non-empty snapshot qualifies.
    pub fn is_meaningful_after(&self, previous: Option<&PartialResult>) -> bool {
        let Some(previous) = previous else {
            return !self.is_empty();
        };

        let score_changed = |new: Option<u32>, old: Option<u32>| new.is_some() && new != old;
        if score_changed(self.match_score, previous.match_score)
            || score_changed(self.ats_score, previous.ats_score)
        {
            return true;
        }

        let grew = |new: usize, old: usize| new > old;
        if grew(list_len(&self.missing_skills), list_len(&previous.missing_skills))
            || grew(list_len(&self.resume_strengths), list_len(&previous.resume_strengths))
            || grew(
                improvements_len(&self.improvements),
                improvements_len(&previous.improvements),
            )
            || grew(
                keywords_len(&self.keyword_analysis, |k| &k.present),
                keywords_len(&previous.keyword_analysis, |k| &k.present),
            )
            || grew(
                keywords_len(&self.keyword_analysis, |k| &k.missing),
                keywords_len(&previous.keyword_analysis, |k| &k.missing),
            )
        {
            return true;
        }

        matches!(
            &self.role_fit_summary,
            Some(summary) if previous.role_fit_summary.as_ref() != Some(summary)
        )
    }
}

fn list_len(list: &Option<Vec<String>>) -> usize {
    list.as_ref().map_or(0, Vec::len)
}

fn improvements_len(improvements: &Option<Improvements>) -> usize {
    improvements.as_ref().map_or(0, Improvements::len)
}

fn keywords_len(
    analysis: &Option<KeywordAnalysis>,
    side: impl Fn(&KeywordAnalysis) -> &Vec<String>,
) -> usize {
    analysis.as_ref().map_or(0, |k| side(k).len())
}

fn key_seen(buffer: &str, key: Key) -> bool {
    buffer.contains(&format!("\"{}\"", key.wire)) || buffer.contains(&format!("\"{}\"", key.alias))
}

/// `"key": <digits>` followed by `,` or `}`, so digits still arriving are not reported.
fn score_regex(key: Key) -> Regex {
    Regex::new(&format!(
        r#""(?:{}|{})"\s*:\s*(\d+)\s*[,}}]"#,
        key.wire, key.alias
    ))
    .expect("score pattern is a valid regex")
}

fn match_score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| score_regex(MATCH_SCORE))
}

fn ats_score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| score_regex(ATS_SCORE))
}

fn capture_score(pattern: &Regex, buffer: &str) -> Option<u32> {
    pattern
        .captures(buffer)
        .and_then(|captures| captures[1].parse().ok())
}

// ────────────────────────────────────────────────────────────────────────────
// Decoder state
// ────────────────────────────────────────────────────────────────────────────

/// Per-session decoder state: the accumulated buffer and the last emitted snapshot.
/// Owned by exactly one streaming session.
#[derive(Debug, Default)]
pub struct StreamingDecoder {
    buffer: String,
    last_emitted: Option<PartialResult>,
}

impl StreamingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Accepts the next fragment and returns a partial result if it carries new information.
    pub fn push(&mut self, fragment: &str) -> Option<PartialResult> {
        self.buffer.push_str(fragment);

        let candidate = PartialResult::from_buffer(&self.buffer);
        if !candidate.is_meaningful_after(self.last_emitted.as_ref()) {
            return None;
        }

        self.last_emitted = Some(candidate.clone());
        Some(candidate)
    }

    /// Parses and validates the complete buffer once the stream has ended.
    pub fn finish(self) -> Result<CanonicalResult, AnalysisError> {
        if self.buffer.trim().is_empty() {
            return Err(AnalysisError::MalformedOutput(
                "inference stream produced no content".to_string(),
            ));
        }
        parse_and_validate(&self.buffer)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Streaming session
// ────────────────────────────────────────────────────────────────────────────

/// One item of a streaming analysis. `Complete` is always the last success item.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Partial(PartialResult),
    Complete(CanonicalResult),
}

pub type AnalysisStream = BoxStream<'static, Result<AnalysisEvent, AnalysisError>>;

enum Session {
    Pending {
        service: Arc<dyn InferenceService>,
        prompt: String,
    },
    Decoding {
        fragments: FragmentStream,
        decoder: StreamingDecoder,
    },
    Done,
}

/// Opens one inference stream and decodes it lazily.
///
/// Nothing happens until the returned stream is polled. It yields partials,
/// then either `Complete` or a single error, then ends. Dropping it early
/// drops the underlying fragment stream and with it the service connection.
pub fn stream_analysis(service: Arc<dyn InferenceService>, input: &AnalysisInput) -> AnalysisStream {
    let session = Session::Pending {
        service,
        prompt: build_analysis_prompt(input),
    };
    stream::unfold(session, next_event).boxed()
}

async fn next_event(
    mut session: Session,
) -> Option<(Result<AnalysisEvent, AnalysisError>, Session)> {
    loop {
        session = match session {
            Session::Pending { service, prompt } => {
                let sampling = SamplingConfig::default();
                match service.stream(ANALYSIS_SYSTEM, &prompt, &sampling).await {
                    Ok(fragments) => Session::Decoding {
                        fragments,
                        decoder: StreamingDecoder::new(),
                    },
                    Err(e) => return Some((Err(e.into()), Session::Done)),
                }
            }
            Session::Decoding {
                mut fragments,
                mut decoder,
            } => match fragments.next().await {
                Some(Ok(fragment)) => {
                    let partial = decoder.push(&fragment);
                    let session = Session::Decoding { fragments, decoder };
                    match partial {
                        Some(partial) => return Some((Ok(AnalysisEvent::Partial(partial)), session)),
                        None => session,
                    }
                }
                Some(Err(e)) => return Some((Err(e.into()), Session::Done)),
                None => {
                    drop(fragments);
                    let outcome = decoder.finish().map(AnalysisEvent::Complete);
                    return Some((outcome, Session::Done));
                }
            },
            Session::Done => return None,
        };
    }
}
