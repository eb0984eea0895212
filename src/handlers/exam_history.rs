// src/handlers/exam_history.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};

use crate::{
    authz::{self, Action, Role},
    error::AppError,
    handlers::subject::SUBJECT_COLUMNS,
    models::{
        exam_history::{
            CreateExamHistoryRequest, ExamHistory, ExamHistoryListParams, ScoreExtreme,
            StatisticParams, SubjectStatistic,
        },
        subject::Subject,
    },
    pagination::PageQuery,
    response::{self, Pagination},
    utils::jwt::Claims,
};

const HISTORY_COLUMNS: &str = "\
    id, title, student_id, subject_id, exam_id, result, score, started_at, \
    period_time, status, created_at, updated_at";

/// Records a student's attempt. The title is denormalized from the exam at
/// submission time; ad-hoc generated exams have no exam row and get a
/// generic title. The exam's usage counter is bumped afterwards.
pub async fn create_exam_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamHistoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    if !authz::allows(role, Action::CreateAttempt) {
        return Err(AppError::NoPermission);
    }

    let title = match payload.exam_id {
        Some(exam_id) => {
            let title: Option<String> =
                sqlx::query_scalar("SELECT title FROM exams WHERE id = $1")
                    .bind(exam_id)
                    .fetch_optional(&pool)
                    .await?;
            title.ok_or_else(|| AppError::NotFound("Exam not found".into()))?
        }
        None => "Đề thi ngẫu nhiên".to_string(),
    };

    let started_at = payload.started_at.unwrap_or_else(Utc::now);

    let history = sqlx::query_as::<_, ExamHistory>(&format!(
        "INSERT INTO exam_histories
            (title, student_id, subject_id, exam_id, result, score,
             started_at, period_time, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACTIVE')
         RETURNING {HISTORY_COLUMNS}"
    ))
    .bind(&title)
    .bind(claims.user_id())
    .bind(payload.subject_id)
    .bind(payload.exam_id)
    .bind(SqlJson(&payload.result))
    .bind(payload.score)
    .bind(started_at)
    .bind(payload.period_time)
    .fetch_one(&pool)
    .await?;

    if let Some(exam_id) = payload.exam_id {
        sqlx::query("UPDATE exams SET num_of_use = num_of_use + 1 WHERE id = $1")
            .bind(exam_id)
            .execute(&pool)
            .await?;
    }

    Ok(response::ok(history))
}

/// Lists attempts, newest first. Students only ever see their own rows.
pub async fn list_exam_histories(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExamHistoryListParams>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    let student_id = if role == Role::Student {
        Some(claims.user_id())
    } else {
        params.student_id
    };

    let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
        if let Some(student_id) = student_id {
            builder.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(keyword) = &params.keyword {
            builder
                .push(" AND title ILIKE ")
                .push_bind(format!("%{}%", keyword));
        }
    };

    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM exam_histories WHERE status = 'ACTIVE'");
    push_filters(&mut count_builder);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {HISTORY_COLUMNS} FROM exam_histories WHERE status = 'ACTIVE'"
    ));
    push_filters(&mut builder);
    builder.push(" ORDER BY created_at DESC");
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let histories: Vec<ExamHistory> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(response::paged(
        histories,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Retrieves a single attempt. Absent rows yield null data. Students may
/// only read their own attempts.
pub async fn get_exam_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let history = sqlx::query_as::<_, ExamHistory>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM exam_histories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    if let Some(history) = &history {
        if role == Role::Student && history.student_id != claims.user_id() {
            return Err(AppError::NoPermission);
        }
    }

    Ok(response::ok(history))
}

/// Soft-deletes an attempt. Students may only delete their own.
pub async fn delete_exam_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let student_id: Option<i64> =
        sqlx::query_scalar("SELECT student_id FROM exam_histories WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let student_id = student_id.ok_or_else(|| AppError::NotFound("History not found".into()))?;

    if role == Role::Student && student_id != claims.user_id() {
        return Err(AppError::NoPermission);
    }

    sqlx::query("UPDATE exam_histories SET status = 'INACTIVE', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(response::ok(()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregates a list of attempts (already newest-first) into the mean and
/// both extremes. Ties are reported in full: every history id that reached
/// the extreme score appears in the list.
fn summarize(histories: &[ExamHistory]) -> (f64, ScoreExtreme, ScoreExtreme) {
    if histories.is_empty() {
        let empty = || ScoreExtreme {
            score: 0.0,
            history_ids: Vec::new(),
        };
        return (0.0, empty(), empty());
    }

    let sum: f64 = histories.iter().map(|h| h.score).sum();
    let average = round2(sum / histories.len() as f64);

    let max = histories
        .iter()
        .map(|h| h.score)
        .fold(f64::MIN, f64::max);
    let min = histories
        .iter()
        .map(|h| h.score)
        .fold(f64::MAX, f64::min);

    let ids_at = |target: f64| -> Vec<i64> {
        histories
            .iter()
            .filter(|h| h.score == target)
            .map(|h| h.id)
            .collect()
    };

    (
        average,
        ScoreExtreme {
            score: max,
            history_ids: ids_at(max),
        },
        ScoreExtreme {
            score: min,
            history_ids: ids_at(min),
        },
    )
}

/// Per-subject score statistics for the calling student: their attempts
/// newest-first plus average, best and worst scores. With `subjectId` the
/// report covers just that subject, otherwise every subject.
pub async fn statistic(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<StatisticParams>,
) -> Result<impl IntoResponse, AppError> {
    let subjects: Vec<Subject> = match params.subject_id {
        Some(subject_id) => {
            sqlx::query_as(&format!(
                "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"
            ))
            .bind(subject_id)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as(&format!(
                "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY id ASC"
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    let histories: Vec<ExamHistory> = sqlx::query_as(&format!(
        "SELECT {HISTORY_COLUMNS} FROM exam_histories
         WHERE student_id = $1 AND status = 'ACTIVE'
         ORDER BY created_at DESC"
    ))
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    let report: Vec<SubjectStatistic> = subjects
        .into_iter()
        .map(|subject| {
            let subject_histories: Vec<ExamHistory> = histories
                .iter()
                .filter(|h| h.subject_id == subject.id)
                .cloned()
                .collect();
            let (average_score, max_score, min_score) = summarize(&subject_histories);
            SubjectStatistic {
                subject,
                histories: subject_histories,
                average_score,
                max_score,
                min_score,
            }
        })
        .collect();

    Ok(response::ok(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(id: i64, score: f64) -> ExamHistory {
        ExamHistory {
            id,
            title: "Midterm".to_string(),
            student_id: 1,
            subject_id: 1,
            exam_id: Some(1),
            result: SqlJson(Vec::new()),
            score,
            started_at: Utc::now(),
            period_time: 600,
            status: "ACTIVE".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn summary_reports_all_tied_extremes() {
        let histories = vec![history(1, 5.0), history(2, 8.0), history(3, 8.0)];
        let (average, max, min) = summarize(&histories);

        assert_eq!(average, 7.0);
        assert_eq!(
            max,
            ScoreExtreme {
                score: 8.0,
                history_ids: vec![2, 3],
            }
        );
        assert_eq!(
            min,
            ScoreExtreme {
                score: 5.0,
                history_ids: vec![1],
            }
        );
    }

    #[test]
    fn average_is_rounded_to_two_decimals() {
        let histories = vec![history(1, 5.0), history(2, 6.0), history(3, 9.0)];
        let (average, _, _) = summarize(&histories);
        assert_eq!(average, 6.67);
    }

    #[test]
    fn empty_subject_yields_zeroes() {
        let (average, max, min) = summarize(&[]);
        assert_eq!(average, 0.0);
        assert_eq!(max.score, 0.0);
        assert!(max.history_ids.is_empty());
        assert!(min.history_ids.is_empty());
    }
}
