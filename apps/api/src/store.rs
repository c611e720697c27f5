//! Persistence of finished analyses and the history listing built on them.
//!
//! Writes happen only after a result has passed contract validation.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::analysis::contract::CanonicalResult;
use crate::analysis::input::AnalysisInput;
use crate::models::analysis::{AnalysisSummaryRow, HistoryEntry};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

const UNTITLED_POSITION: &str = "Untitled Position";

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Stores the input texts and the accepted result. Returns the analysis id.
    async fn save(
        &self,
        user_id: Uuid,
        input: &AnalysisInput,
        result: &CanonicalResult,
    ) -> Result<Uuid, sqlx::Error>;

    /// Newest first.
    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error>;
}

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn save(
        &self,
        user_id: Uuid,
        input: &AnalysisInput,
        result: &CanonicalResult,
    ) -> Result<Uuid, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Users are created lazily so the resume foreign key always resolves.
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .bind(format!("user_{user_id}@placeholder.resly.app"))
            .execute(&mut *tx)
            .await?;

        let resume_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO resumes (user_id, file_url, parsed_text, file_name, file_size_bytes)
            VALUES ($1, '', $2, 'resume.pdf', $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.resume_text())
        .bind(input.resume_text().len() as i64)
        .fetch_one(&mut *tx)
        .await?;

        let analysis_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO analyses (resume_id, job_description, result_json, match_score, ats_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(resume_id)
        .bind(input.job_description())
        .bind(Json(result))
        .bind(i32::from(result.match_score))
        .bind(i32::from(result.ats_score))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Saved analysis {analysis_id} for user {user_id}");
        Ok(analysis_id)
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        let rows: Vec<AnalysisSummaryRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.match_score, a.ats_score, a.job_description, a.created_at
            FROM analyses a
            JOIN resumes r ON r.id = a.resume_id
            WHERE r.user_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(history_entry).collect())
    }
}

/// Clamps caller-supplied paging to the supported range.
pub fn history_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

pub fn history_entry(row: AnalysisSummaryRow) -> HistoryEntry {
    HistoryEntry {
        id: row.id,
        job_title: extract_job_title(&row.job_description)
            .unwrap_or_else(|| UNTITLED_POSITION.to_string()),
        company: extract_company(&row.job_description),
        match_score: row.match_score,
        ats_score: row.ats_score,
        created_at: row.created_at,
    }
}

/// Title from a leading `Job Title:`, `Position:` or `Role:` line.
pub fn extract_job_title(job_description: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:job title|position|role):\s*(.+?)(?:\n|$)")
            .expect("title pattern is a valid regex")
    });
    first_capture(pattern, job_description)
}

/// Company from the first `at:` or `Company:` label.
pub fn extract_company(job_description: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:at|company):\s*(.+?)(?:\n|$)")
            .expect("company pattern is a valid regex")
    });
    first_capture(pattern, job_description)
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
        .filter(|value| !value.is_empty())
}
