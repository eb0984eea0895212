// src/handlers/question.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    authz::{self, Action, Role},
    error::AppError,
    models::question::{
        CreateQuestionRequest, Question, QuestionListParams, QuestionWithTopic,
        UpdateQuestionRequest,
    },
    pagination::{self, PageQuery},
    response::{self, Pagination},
    utils::jwt::Claims,
};

/// Qualified column list for the questions/topics join used by listings.
const QUESTION_JOIN_COLUMNS: &str = "\
    q.id, q.title, q.answers, q.level, q.subject_id, q.topic_id, \
    q.creator_id, q.security, q.status, q.explanation, q.created_at, \
    q.updated_at, t.title AS topic_title";

const QUESTION_COLUMNS: &str = "\
    id, title, answers, level, subject_id, topic_id, creator_id, security, \
    status, explanation, created_at, updated_at";

const SORT_FIELDS: &[(&str, &str)] = &[
    ("level", "q.level"),
    ("title", "q.title"),
    ("createdAt", "q.created_at"),
];

/// Whether the answer key must be hidden from this actor.
fn hides_answer_key(security: bool, creator_id: i64, actor_id: i64, actor_role: Role) -> bool {
    security && actor_role != Role::Admin && actor_id != creator_id
}

fn mask_question(question: &mut Question, claims: &Claims, role: Role) {
    if hides_answer_key(
        question.security,
        question.creator_id,
        claims.user_id(),
        role,
    ) {
        for answer in question.answers.0.iter_mut() {
            answer.is_correct = false;
        }
    }
}

fn push_question_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &QuestionListParams) {
    if let Some(subject_id) = params.subject_id {
        builder.push(" AND q.subject_id = ").push_bind(subject_id);
    }
    if let Some(topic_id) = params.topic_id {
        builder.push(" AND q.topic_id = ").push_bind(topic_id);
    }
    if let Some(level) = params.level {
        builder.push(" AND q.level = ").push_bind(level);
    }
    if let Some(creator_id) = params.creator_id {
        builder.push(" AND q.creator_id = ").push_bind(creator_id);
    }
    if let Some(keyword) = &params.keyword {
        builder
            .push(" AND q.title ILIKE ")
            .push_bind(format!("%{}%", keyword));
    }
    let ids = params.id_list();
    if !ids.is_empty() {
        builder.push(" AND q.id = ANY(").push_bind(ids).push(")");
    }
}

/// Lists questions with filters and topic titles joined in. With
/// `random=true` a uniform sample of `size` questions is drawn instead and
/// the response carries no pagination block.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    if params.random.unwrap_or(false) {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {QUESTION_JOIN_COLUMNS} FROM questions q \
             LEFT JOIN topics t ON t.id = q.topic_id \
             WHERE q.status = 'ACTIVE'"
        ));
        push_question_filters(&mut builder, &params);
        builder.push(" ORDER BY RANDOM() LIMIT ").push_bind(page.size());

        let mut questions: Vec<QuestionWithTopic> =
            builder.build_query_as().fetch_all(&pool).await?;
        for item in &mut questions {
            mask_question(&mut item.question, &claims, role);
        }
        return Ok(response::ok(questions));
    }

    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions q WHERE q.status = 'ACTIVE'");
    push_question_filters(&mut count_builder, &params);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {QUESTION_JOIN_COLUMNS} FROM questions q \
         LEFT JOIN topics t ON t.id = q.topic_id \
         WHERE q.status = 'ACTIVE'"
    ));
    push_question_filters(&mut builder, &params);

    match pagination::parse_sort(params.sort.as_deref(), SORT_FIELDS) {
        Some((column, ascending)) => {
            builder.push(format!(
                " ORDER BY {} {}",
                column,
                if ascending { "ASC" } else { "DESC" }
            ));
        }
        None => {
            builder.push(" ORDER BY q.id DESC");
        }
    }
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let mut questions: Vec<QuestionWithTopic> = builder.build_query_as().fetch_all(&pool).await?;
    for item in &mut questions {
        mask_question(&mut item.question, &claims, role);
    }

    Ok(response::paged(
        questions,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Retrieves a single question. Absent rows yield null data. The answer key
/// is masked for secured questions the caller does not own.
pub async fn get_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let mut question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    if let Some(question) = question.as_mut() {
        mask_question(question, &claims, role);
    }

    Ok(response::ok(question))
}

/// Creates a question owned by the caller. Teachers and admins only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    if !authz::allows(role, Action::CreateQuestion) {
        return Err(AppError::NoPermission);
    }

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions
            (title, answers, level, subject_id, topic_id, creator_id,
             security, status, explanation)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'ACTIVE', $8)
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(SqlJson(&payload.answers))
    .bind(payload.level)
    .bind(payload.subject_id)
    .bind(payload.topic_id)
    .bind(claims.user_id())
    .bind(payload.security)
    .bind(&payload.explanation)
    .fetch_one(&pool)
    .await?;

    Ok(response::ok(question))
}

/// Updates a question. Fields are optional. Any authenticated teacher or
/// admin may edit; ownership only gates deletion.
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;
    if !authz::allows(role, Action::CreateQuestion) {
        return Err(AppError::NoPermission);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }
    if let Some(answers) = payload.answers {
        separated.push("answers = ");
        separated.push_bind_unseparated(SqlJson(answers));
    }
    if let Some(level) = payload.level {
        separated.push("level = ");
        separated.push_bind_unseparated(level);
    }
    if let Some(subject_id) = payload.subject_id {
        separated.push("subject_id = ");
        separated.push_bind_unseparated(subject_id);
    }
    if let Some(topic_id) = payload.topic_id {
        separated.push("topic_id = ");
        separated.push_bind_unseparated(topic_id);
    }
    if let Some(security) = payload.security {
        separated.push("security = ");
        separated.push_bind_unseparated(security);
    }
    if let Some(explanation) = payload.explanation {
        separated.push("explanation = ");
        separated.push_bind_unseparated(explanation);
    }
    separated.push("updated_at = now()");

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(format!(" RETURNING {QUESTION_COLUMNS}"));

    let question: Option<Question> = builder.build_query_as().fetch_optional(&pool).await?;

    Ok(response::ok(question))
}

/// Soft-deletes a question. Teachers may only delete their own; admins may
/// delete any.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let role = claims.role()?;

    let creator_id: Option<i64> =
        sqlx::query_scalar("SELECT creator_id FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
    let creator_id = creator_id.ok_or_else(|| AppError::NotFound("Question not found".into()))?;

    let own = creator_id == claims.user_id();
    if !authz::allows(role, Action::DeleteQuestion { own }) {
        return Err(AppError::NoPermission);
    }

    sqlx::query("UPDATE questions SET status = 'INACTIVE', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(response::ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_key_hidden_only_for_secured_foreign_questions() {
        assert!(hides_answer_key(true, 10, 20, Role::Teacher));
        assert!(hides_answer_key(true, 10, 20, Role::Student));
        assert!(!hides_answer_key(true, 10, 10, Role::Teacher));
        assert!(!hides_answer_key(true, 10, 20, Role::Admin));
        assert!(!hides_answer_key(false, 10, 20, Role::Student));
    }
}
