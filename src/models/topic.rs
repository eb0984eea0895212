// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'topics' table. The per-level counters are the quota of
/// questions drawn at each difficulty when generating a random exam.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub subject_id: i64,
    pub num_of_level1: i64,
    pub num_of_level2: i64,
    pub num_of_level3: i64,
    pub num_of_level4: i64,
    pub status: String,
    #[sqlx(rename = "sort_order")]
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a topic.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub subject_id: i64,
    #[serde(default)]
    pub num_of_level1: i64,
    #[serde(default)]
    pub num_of_level2: i64,
    #[serde(default)]
    pub num_of_level3: i64,
    #[serde(default)]
    pub num_of_level4: i64,
    #[serde(default, rename = "order")]
    pub sort_order: i64,
}

/// DTO for updating a topic. Fields are optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    pub title: Option<String>,
    pub subject_id: Option<i64>,
    pub num_of_level1: Option<i64>,
    pub num_of_level2: Option<i64>,
    pub num_of_level3: Option<i64>,
    pub num_of_level4: Option<i64>,
    #[serde(rename = "order")]
    pub sort_order: Option<i64>,
}

/// Query parameters for listing topics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicListParams {
    pub keyword: Option<String>,
    pub subject_id: Option<i64>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
