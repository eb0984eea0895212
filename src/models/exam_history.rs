// src/models/exam_history.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

use crate::models::subject::Subject;

/// One answered question inside an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub question_id: i64,
    pub answer: String,
}

/// Represents the 'exam_histories' table: one row per student attempt.
/// `exam_id` is null for ad-hoc randomly generated exams.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamHistory {
    pub id: i64,

    /// Denormalized from the exam at attempt time.
    pub title: String,

    pub student_id: i64,
    pub subject_id: i64,
    pub exam_id: Option<i64>,
    pub result: Json<Vec<ResultEntry>>,
    pub score: f64,
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Time spent, in seconds.
    pub period_time: i64,

    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for recording an attempt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamHistoryRequest {
    pub exam_id: Option<i64>,
    pub subject_id: i64,
    #[serde(default)]
    pub result: Vec<ResultEntry>,
    pub score: f64,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub period_time: i64,
}

/// Query parameters for listing attempts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamHistoryListParams {
    pub keyword: Option<String>,
    pub student_id: Option<i64>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Query parameters for the statistics endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticParams {
    pub subject_id: Option<i64>,
}

/// Best/worst score with every history id achieving it (ties reported).
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreExtreme {
    pub score: f64,
    pub history_ids: Vec<i64>,
}

/// Per-subject aggregation of a student's attempts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatistic {
    pub subject: Subject,
    /// Most recent first.
    pub histories: Vec<ExamHistory>,
    /// Arithmetic mean, rounded to 2 decimals; 0 when there are no attempts.
    pub average_score: f64,
    pub max_score: ScoreExtreme,
    pub min_score: ScoreExtreme,
}
