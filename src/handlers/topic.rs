// src/handlers/topic.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::topic::{CreateTopicRequest, Topic, TopicListParams, UpdateTopicRequest},
    pagination::PageQuery,
    response::{self, Pagination},
};

pub(crate) const TOPIC_COLUMNS: &str = "\
    id, title, subject_id, num_of_level1, num_of_level2, num_of_level3, \
    num_of_level4, status, sort_order, created_at, updated_at";

fn push_topic_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    keyword: Option<&String>,
    subject_id: Option<i64>,
) {
    let pattern = format!("%{}%", keyword.map(String::as_str).unwrap_or(""));
    builder.push(" AND title ILIKE ").push_bind(pattern);
    if let Some(subject_id) = subject_id {
        builder.push(" AND subject_id = ").push_bind(subject_id);
    }
}

/// Lists active topics ordered by their explicit `order` field.
pub async fn list_topics(
    State(pool): State<PgPool>,
    Query(params): Query<TopicListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM topics WHERE status = 'ACTIVE'");
    push_topic_filters(&mut count_builder, params.keyword.as_ref(), params.subject_id);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE status = 'ACTIVE'"
    ));
    push_topic_filters(&mut builder, params.keyword.as_ref(), params.subject_id);
    builder.push(" ORDER BY sort_order ASC");
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let topics: Vec<Topic> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(response::paged(
        topics,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Retrieves a single topic by ID. Absent rows yield null data.
pub async fn get_topic(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topic =
        sqlx::query_as::<_, Topic>(&format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1"))
            .bind(id)
            .fetch_optional(&pool)
            .await?;

    Ok(response::ok(topic))
}

/// Creates a topic. Staff only (enforced at the routing layer).
pub async fn create_topic(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let topic = sqlx::query_as::<_, Topic>(&format!(
        "INSERT INTO topics
            (title, subject_id, num_of_level1, num_of_level2, num_of_level3,
             num_of_level4, status, sort_order)
         VALUES ($1, $2, $3, $4, $5, $6, 'ACTIVE', $7)
         RETURNING {TOPIC_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(payload.subject_id)
    .bind(payload.num_of_level1)
    .bind(payload.num_of_level2)
    .bind(payload.num_of_level3)
    .bind(payload.num_of_level4)
    .bind(payload.sort_order)
    .fetch_one(&pool)
    .await?;

    Ok(response::ok(topic))
}

/// Updates a topic. Staff only. Fields are optional.
pub async fn update_topic(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE topics SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }
    if let Some(subject_id) = payload.subject_id {
        separated.push("subject_id = ");
        separated.push_bind_unseparated(subject_id);
    }
    if let Some(n) = payload.num_of_level1 {
        separated.push("num_of_level1 = ");
        separated.push_bind_unseparated(n);
    }
    if let Some(n) = payload.num_of_level2 {
        separated.push("num_of_level2 = ");
        separated.push_bind_unseparated(n);
    }
    if let Some(n) = payload.num_of_level3 {
        separated.push("num_of_level3 = ");
        separated.push_bind_unseparated(n);
    }
    if let Some(n) = payload.num_of_level4 {
        separated.push("num_of_level4 = ");
        separated.push_bind_unseparated(n);
    }
    if let Some(sort_order) = payload.sort_order {
        separated.push("sort_order = ");
        separated.push_bind_unseparated(sort_order);
    }
    separated.push("updated_at = now()");

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(format!(" RETURNING {TOPIC_COLUMNS}"));

    let topic: Option<Topic> = builder.build_query_as().fetch_optional(&pool).await?;

    Ok(response::ok(topic))
}

/// Soft-deletes a topic. Staff only.
pub async fn delete_topic(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE topics SET status = 'INACTIVE', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(response::ok(()))
}
