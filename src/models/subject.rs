// src/models/subject.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'subjects' table. Read-only reference data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub label: String,
    pub value: String,
    pub name: String,

    /// Target question count for a randomly generated exam.
    pub question_number: i64,

    /// Exam duration in minutes.
    #[sqlx(rename = "time_limit")]
    #[serde(rename = "time")]
    pub time_limit: i64,
}

/// Query parameters for listing subjects.
#[derive(Debug, Deserialize)]
pub struct SubjectListParams {
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
