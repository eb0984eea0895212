// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::Question;

/// Represents the 'exams' table in the database.
///
/// Once `now >= publish_at` the exam is visible to students and can no
/// longer be edited; there is no way back to an unpublished state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub subject_id: i64,
    pub creator_id: i64,
    pub question_ids: Vec<i64>,

    /// Optional access gate; empty string means no password.
    pub password: String,

    pub status: String,

    /// Attempt counter, incremented when a student submits a history row.
    pub num_of_use: i64,

    pub publish_at: chrono::DateTime<chrono::Utc>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Exam row joined with the creator's full name.
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamWithCreator {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub exam: Exam,
    pub creator_name: Option<String>,
}

/// List/detail item: for a student actor `last_score` carries the score of
/// their most recent attempt at this exam.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamListItem {
    #[serde(flatten)]
    pub exam: ExamWithCreator,
    pub last_score: Option<f64>,
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub subject_id: i64,
    pub question_ids: Vec<i64>,
    pub password: Option<String>,
    /// Defaults to now, i.e. immediate publish.
    pub publish_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for updating an exam. Fields are optional. Rejected outright once
/// the exam is published.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    pub title: Option<String>,
    pub subject_id: Option<i64>,
    pub question_ids: Option<Vec<i64>>,
    pub password: Option<String>,
    pub publish_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameters for listing exams.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamListParams {
    pub subject_id: Option<i64>,
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Query parameters for random exam generation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateExamParams {
    pub subject_id: i64,
}

/// An unsaved, randomly generated exam. The caller must POST it back to
/// persist it as a real exam.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDraft {
    pub title: String,
    pub subject_id: i64,
    pub question_ids: Vec<i64>,
    pub questions: Vec<Question>,
    pub password: String,
    pub status: String,
    pub creator_id: i64,
}
