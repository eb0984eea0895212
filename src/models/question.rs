// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// A single answer option. `is_correct` marks the expected answer(s).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub label: String,
    pub value: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    /// The question statement.
    pub title: String,

    /// Answer options, stored as a JSON array in the database.
    pub answers: Json<Vec<Answer>>,

    /// Difficulty level, 1 (easiest) through 4.
    pub level: i64,

    pub subject_id: i64,
    pub topic_id: i64,
    pub creator_id: i64,

    /// Hides the answer key from non-owners.
    pub security: bool,

    pub status: String,
    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A question enriched with its topic's title (denormalized join used by
/// the listing endpoint).
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithTopic {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub question: Question,
    pub topic_title: Option<String>,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub title: String,
    #[validate(custom(function = validate_answers))]
    pub answers: Vec<Answer>,
    #[validate(range(min = 1, max = 4))]
    pub level: i64,
    pub subject_id: i64,
    pub topic_id: i64,
    #[serde(default)]
    pub security: bool,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

fn validate_answers(answers: &[Answer]) -> Result<(), validator::ValidationError> {
    if answers.is_empty() {
        return Err(validator::ValidationError::new("answers_cannot_be_empty"));
    }
    for answer in answers {
        if answer.value.len() > 500 {
            return Err(validator::ValidationError::new("answer_too_long"));
        }
    }
    Ok(())
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    pub title: Option<String>,
    pub answers: Option<Vec<Answer>>,
    pub level: Option<i64>,
    pub subject_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub security: Option<bool>,
    pub explanation: Option<String>,
}

/// Query parameters for listing questions. `random=true` bypasses
/// pagination and draws a uniform sample of `size` questions instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListParams {
    pub subject_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub level: Option<i64>,
    pub keyword: Option<String>,
    pub creator_id: Option<i64>,
    /// Comma-separated list of question ids.
    pub ids: Option<String>,
    pub random: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl QuestionListParams {
    pub fn id_list(&self) -> Vec<i64> {
        self.ids
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_parses_and_skips_garbage() {
        let params = QuestionListParams {
            subject_id: None,
            topic_id: None,
            level: None,
            keyword: None,
            creator_id: None,
            ids: Some("1, 2,abc,4".to_string()),
            random: None,
            sort: None,
            page: None,
            size: None,
        };
        assert_eq!(params.id_list(), vec![1, 2, 4]);
    }
}
