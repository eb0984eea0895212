// src/handlers/exam.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    authz::{self, Action, Role},
    error::AppError,
    handlers::subject::SUBJECT_COLUMNS,
    models::{
        exam::{
            CreateExamRequest, Exam, ExamDraft, ExamListItem, ExamListParams, ExamWithCreator,
            GenerateExamParams, UpdateExamRequest,
        },
        question::Question,
        subject::Subject,
        topic::Topic,
    },
    pagination::PageQuery,
    response::{self, Pagination},
    utils::jwt::Claims,
};

/// Qualified column list for the exams/users join used by listings.
const EXAM_JOIN_COLUMNS: &str = "\
    e.id, e.title, e.subject_id, e.creator_id, e.question_ids, e.password, \
    e.status, e.num_of_use, e.publish_at, e.created_at, e.updated_at, \
    u.full_name AS creator_name";

const EXAM_COLUMNS: &str = "\
    id, title, subject_id, creator_id, question_ids, password, status, \
    num_of_use, publish_at, created_at, updated_at";

fn push_exam_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ExamListParams) {
    if let Some(subject_id) = params.subject_id {
        builder.push(" AND e.subject_id = ").push_bind(subject_id);
    }
    if let Some(keyword) = &params.keyword {
        builder
            .push(" AND e.title ILIKE ")
            .push_bind(format!("%{}%", keyword));
    }
}

/// Most recent attempt score per exam for one student.
async fn last_scores(
    pool: &PgPool,
    student_id: i64,
    exam_ids: &[i64],
) -> Result<HashMap<i64, f64>, AppError> {
    if exam_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, f64)> = sqlx::query_as(
        "SELECT DISTINCT ON (exam_id) exam_id, score
         FROM exam_histories
         WHERE student_id = $1 AND exam_id = ANY($2) AND status = 'ACTIVE'
         ORDER BY exam_id, created_at DESC",
    )
    .bind(student_id)
    .bind(exam_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Lists published exams. Unpublished exams never appear, not even for
/// their creator. For student callers each item carries the score of their
/// latest attempt.
pub async fn list_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    let mut count_builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM exams e WHERE e.status = 'ACTIVE' AND e.publish_at <= now()",
    );
    push_exam_filters(&mut count_builder, &params);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {EXAM_JOIN_COLUMNS} FROM exams e \
         LEFT JOIN users u ON u.id = e.creator_id \
         WHERE e.status = 'ACTIVE' AND e.publish_at <= now()"
    ));
    push_exam_filters(&mut builder, &params);
    builder.push(" ORDER BY e.publish_at DESC");
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let exams: Vec<ExamWithCreator> = builder.build_query_as().fetch_all(&pool).await?;

    let scores = if role == Role::Student {
        let ids: Vec<i64> = exams.iter().map(|e| e.exam.id).collect();
        last_scores(&pool, claims.user_id(), &ids).await?
    } else {
        HashMap::new()
    };

    let items: Vec<ExamListItem> = exams
        .into_iter()
        .map(|exam| {
            let last_score = scores.get(&exam.exam.id).copied();
            ExamListItem { exam, last_score }
        })
        .collect();

    Ok(response::paged(
        items,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Retrieves a single published exam. Unpublished or absent exams yield
/// null data.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let exam = sqlx::query_as::<_, ExamWithCreator>(&format!(
        "SELECT {EXAM_JOIN_COLUMNS} FROM exams e \
         LEFT JOIN users u ON u.id = e.creator_id \
         WHERE e.id = $1 AND e.status = 'ACTIVE' AND e.publish_at <= now()"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    let item = match exam {
        Some(exam) => {
            let last_score = if role == Role::Student {
                last_scores(&pool, claims.user_id(), &[exam.exam.id])
                    .await?
                    .get(&exam.exam.id)
                    .copied()
            } else {
                None
            };
            Some(ExamListItem { exam, last_score })
        }
        None => None,
    };

    Ok(response::ok(item))
}

/// Creates an exam owned by the caller. Teachers and admins only. Without
/// an explicit `publishAt` the exam is published immediately. The creator's
/// exam counter is bumped afterwards.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    if !authz::allows(role, Action::CreateExam) {
        return Err(AppError::NoPermission);
    }

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let publish_at = payload.publish_at.unwrap_or_else(Utc::now);
    let password = payload.password.unwrap_or_default();

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams
            (title, subject_id, creator_id, question_ids, password, status,
             num_of_use, publish_at)
         VALUES ($1, $2, $3, $4, $5, 'ACTIVE', 0, $6)
         RETURNING {EXAM_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(payload.subject_id)
    .bind(claims.user_id())
    .bind(&payload.question_ids)
    .bind(&password)
    .bind(publish_at)
    .fetch_one(&pool)
    .await?;

    sqlx::query("UPDATE users SET num_of_exam = num_of_exam + 1 WHERE id = $1")
        .bind(claims.user_id())
        .execute(&pool)
        .await?;

    Ok(response::ok(exam))
}

/// Updates an exam. Fields are optional. Rejected outright once the exam
/// has reached its publish time.
pub async fn update_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    if !authz::allows(role, Action::CreateExam) {
        return Err(AppError::NoPermission);
    }

    let publish_at: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("SELECT publish_at FROM exams WHERE id = $1 AND status = 'ACTIVE'")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let publish_at = publish_at.ok_or_else(|| AppError::NotFound("Exam not found".into()))?;

    if Utc::now() >= publish_at {
        return Err(AppError::CantEditOncePublished);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exams SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }
    if let Some(subject_id) = payload.subject_id {
        separated.push("subject_id = ");
        separated.push_bind_unseparated(subject_id);
    }
    if let Some(question_ids) = payload.question_ids {
        separated.push("question_ids = ");
        separated.push_bind_unseparated(question_ids);
    }
    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(password);
    }
    if let Some(publish_at) = payload.publish_at {
        separated.push("publish_at = ");
        separated.push_bind_unseparated(publish_at);
    }
    separated.push("updated_at = now()");

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(format!(" RETURNING {EXAM_COLUMNS}"));

    let exam: Option<Exam> = builder.build_query_as().fetch_optional(&pool).await?;

    Ok(response::ok(exam))
}

/// Soft-deletes an exam. Teachers may only delete their own; admins may
/// delete any.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let creator_id: Option<i64> = sqlx::query_scalar("SELECT creator_id FROM exams WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let creator_id = creator_id.ok_or_else(|| AppError::NotFound("Exam not found".into()))?;

    let own = creator_id == claims.user_id();
    if !authz::allows(role, Action::DeleteExam { own }) {
        return Err(AppError::NoPermission);
    }

    sqlx::query("UPDATE exams SET status = 'INACTIVE', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(response::ok(()))
}

fn order_by_level(questions: &mut [Question]) {
    questions.sort_by_key(|q| q.level);
}

/// Builds an unsaved random exam for a subject: for every active topic,
/// draws its per-level quota of questions at random, then orders the whole
/// paper from easiest to hardest. The caller persists it via POST /exams.
pub async fn generate_random_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<GenerateExamParams>,
) -> Result<impl IntoResponse, AppError> {
    let subject = sqlx::query_as::<_, Subject>(&format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"
    ))
    .bind(params.subject_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Subject not found".into()))?;

    let topics = sqlx::query_as::<_, Topic>(
        "SELECT id, title, subject_id, num_of_level1, num_of_level2,
                num_of_level3, num_of_level4, status, sort_order,
                created_at, updated_at
         FROM topics
         WHERE subject_id = $1 AND status = 'ACTIVE'
         ORDER BY sort_order ASC",
    )
    .bind(params.subject_id)
    .fetch_all(&pool)
    .await?;

    let mut questions: Vec<Question> = Vec::new();
    for topic in &topics {
        let quotas = [
            (1_i64, topic.num_of_level1),
            (2, topic.num_of_level2),
            (3, topic.num_of_level3),
            (4, topic.num_of_level4),
        ];
        for (level, quota) in quotas {
            if quota <= 0 {
                continue;
            }
            let drawn = sqlx::query_as::<_, Question>(
                "SELECT id, title, answers, level, subject_id, topic_id,
                        creator_id, security, status, explanation,
                        created_at, updated_at
                 FROM questions
                 WHERE topic_id = $1 AND level = $2 AND status = 'ACTIVE'
                 ORDER BY RANDOM()
                 LIMIT $3",
            )
            .bind(topic.id)
            .bind(level)
            .bind(quota)
            .fetch_all(&pool)
            .await?;
            questions.extend(drawn);
        }
    }

    order_by_level(&mut questions);

    let draft = ExamDraft {
        title: format!("Đề thi ngẫu nhiên môn {}", subject.label),
        subject_id: subject.id,
        question_ids: questions.iter().map(|q| q.id).collect(),
        questions,
        password: String::new(),
        status: "ACTIVE".to_string(),
        creator_id: claims.user_id(),
    };

    Ok(response::ok(draft))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json as SqlJson;

    fn question(id: i64, level: i64) -> Question {
        Question {
            id,
            title: format!("q{id}"),
            answers: SqlJson(Vec::new()),
            level,
            subject_id: 1,
            topic_id: 1,
            creator_id: 1,
            security: false,
            status: "ACTIVE".to_string(),
            explanation: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn generated_paper_runs_easy_to_hard() {
        let mut questions = vec![question(1, 3), question(2, 1), question(3, 4), question(4, 2)];
        order_by_level(&mut questions);
        let levels: Vec<i64> = questions.iter().map(|q| q.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn level_ordering_is_stable_within_a_level() {
        let mut questions = vec![question(10, 2), question(11, 2), question(12, 1)];
        order_by_level(&mut questions);
        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![12, 10, 11]);
    }
}
