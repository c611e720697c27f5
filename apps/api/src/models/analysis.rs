use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the history query: an analysis joined to its owner's resume.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisSummaryRow {
    pub id: Uuid,
    pub match_score: i32,
    pub ats_score: i32,
    pub job_description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub job_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub match_score: i32,
    pub ats_score: i32,
    pub created_at: DateTime<Utc>,
}
