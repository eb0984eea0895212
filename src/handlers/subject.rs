// src/handlers/subject.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::subject::{Subject, SubjectListParams},
    pagination::PageQuery,
    response::{self, Pagination},
};

pub(crate) const SUBJECT_COLUMNS: &str = "id, label, value, name, question_number, time_limit";

/// Lists subjects, optionally filtered by a fuzzy label match.
pub async fn list_subjects(
    State(pool): State<PgPool>,
    Query(params): Query<SubjectListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };
    let pattern = format!("%{}%", params.keyword.as_deref().unwrap_or(""));

    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM subjects WHERE label ILIKE ");
    count_builder.push_bind(pattern.clone());
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE label ILIKE "
    ));
    builder.push_bind(pattern);
    builder.push(" ORDER BY id ASC");
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let subjects: Vec<Subject> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(response::paged(
        subjects,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Retrieves a single subject by ID. Absent rows yield null data.
pub async fn get_subject(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let subject = sqlx::query_as::<_, Subject>(&format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    Ok(response::ok(subject))
}
