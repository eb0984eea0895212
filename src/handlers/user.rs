// src/handlers/user.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    authz::{Action, Role, allows},
    config::Config,
    error::AppError,
    handlers::auth::USER_COLUMNS,
    models::user::{CreateUserRequest, FollowRequest, UpdateUserRequest, User, UserListParams},
    pagination::{PageQuery, parse_sort},
    response::{self, Pagination},
    utils::{crypto::encrypt_password, jwt::Claims, jwt::claims_from_headers},
};

const SORT_FIELDS: &[(&str, &str)] = &[
    ("username", "username"),
    ("fullName", "full_name"),
    ("createdAt", "created_at"),
    ("numOfExam", "num_of_exam"),
];

fn is_unique_violation(e: &sqlx::Error) -> bool {
    let msg = e.to_string();
    msg.contains("unique constraint") || msg.contains("23505")
}

async fn insert_user(
    pool: &PgPool,
    config: &Config,
    payload: &CreateUserRequest,
    role: Role,
) -> Result<User, AppError> {
    let password = match payload.password.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AppError::PasswordRequired),
    };

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&payload.username)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(AppError::UsernameTaken);
    }

    let encrypted = encrypt_password(&config.password_secret, password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users
            (username, password, full_name, role, status, subject_ids,
             avatar, school, address, phone, gender)
         VALUES ($1, $2, $3, $4, 'ACTIVE', $5, $6, $7, $8, $9, $10)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&payload.username)
    .bind(&encrypted)
    .bind(payload.full_name.clone().unwrap_or_default())
    .bind(role.as_str())
    .bind(payload.subject_ids.clone().unwrap_or_default())
    .bind(&payload.avatar)
    .bind(&payload.school)
    .bind(&payload.address)
    .bind(&payload.phone)
    .bind(&payload.gender)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        // The existence check above races with concurrent inserts; the
        // unique index is the actual guarantee.
        if is_unique_violation(&e) {
            AppError::UsernameTaken
        } else {
            tracing::error!("Failed to insert user: {:?}", e);
            AppError::Internal(e.to_string())
        }
    })?;

    Ok(user)
}

/// Public registration. The requested role must be STUDENT; anything else
/// is rejected regardless of credentials.
pub async fn register(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.role != Role::Student.as_str() {
        return Err(AppError::NoPermission);
    }

    let user = insert_user(&pool, &config, &payload, Role::Student).await?;

    Ok(response::ok(user))
}

/// Role-gated user creation. Creating a STUDENT needs no token; creating a
/// TEACHER requires an ADMIN actor; creating an ADMIN is always rejected.
pub async fn create(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let target_role = Role::parse(&payload.role)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{}'", payload.role)))?;

    if target_role != Role::Student {
        let claims =
            claims_from_headers(&headers, &config.jwt_secret).ok_or(AppError::NoPermission)?;
        let actor_role = claims.role().map_err(|_| AppError::NoPermission)?;
        if !allows(actor_role, Action::CreateUser(target_role)) {
            return Err(AppError::NoPermission);
        }
    }

    let user = insert_user(&pool, &config, &payload, target_role).await?;

    Ok(response::ok(user))
}

fn push_user_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    role: Option<&String>,
    keyword: Option<&String>,
    subject_id: Option<i64>,
) {
    if let Some(role) = role {
        builder.push(" AND role = ").push_bind(role.clone());
    }
    let pattern = format!("%{}%", keyword.map(String::as_str).unwrap_or(""));
    builder.push(" AND full_name ILIKE ").push_bind(pattern);
    if let Some(subject_id) = subject_id {
        builder.push(" AND ").push_bind(subject_id);
        builder.push(" = ANY(subject_ids)");
    }
}

/// Lists active users with role/keyword/subject filters and pagination.
///
/// Asking for ADMIN users returns an empty list outright: admins are never
/// listed, by design.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.role.as_deref() == Some("ADMIN") {
        return Ok(response::ok(Vec::<User>::new()));
    }

    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE status = 'ACTIVE'");
    push_user_filters(
        &mut count_builder,
        params.role.as_ref(),
        params.keyword.as_ref(),
        params.subject_id,
    );
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {USER_COLUMNS} FROM users WHERE status = 'ACTIVE'"
    ));
    push_user_filters(
        &mut builder,
        params.role.as_ref(),
        params.keyword.as_ref(),
        params.subject_id,
    );

    match parse_sort(params.sort.as_deref(), SORT_FIELDS) {
        Some((column, ascending)) => {
            builder.push(format!(
                " ORDER BY {} {}",
                column,
                if ascending { "ASC" } else { "DESC" }
            ));
        }
        None => {
            builder.push(" ORDER BY id DESC");
        }
    }
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let users: Vec<User> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(response::paged(
        users,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Lists the teachers a student follows, with the usual filters. A teacher
/// actor has no `following` list and gets an empty result.
pub async fn find_following(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role()? == Role::Teacher {
        return Ok(response::ok(Vec::<User>::new()));
    }

    let following: Option<Vec<i64>> =
        sqlx::query_scalar("SELECT following FROM users WHERE id = $1")
            .bind(claims.user_id())
            .fetch_optional(&pool)
            .await?;
    let following = following.ok_or(AppError::Unauthorized)?;

    if following.is_empty() {
        return Ok(response::ok(Vec::<User>::new()));
    }

    let page = PageQuery {
        page: params.page,
        size: params.size,
    };

    let mut count_builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM users WHERE status = 'ACTIVE' AND role = 'TEACHER' AND id = ANY(",
    );
    count_builder.push_bind(following.clone()).push(")");
    push_user_filters(
        &mut count_builder,
        None,
        params.keyword.as_ref(),
        params.subject_id,
    );
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE status = 'ACTIVE' AND role = 'TEACHER' AND id = ANY("
    ));
    builder.push_bind(following).push(")");
    push_user_filters(
        &mut builder,
        None,
        params.keyword.as_ref(),
        params.subject_id,
    );
    builder.push(" ORDER BY id DESC");
    builder.push(" LIMIT ").push_bind(page.size());
    builder.push(" OFFSET ").push_bind(page.offset());

    let teachers: Vec<User> = builder.build_query_as().fetch_all(&pool).await?;

    Ok(response::paged(
        teachers,
        Pagination {
            page: page.page(),
            size: page.size(),
            total,
        },
    ))
}

/// Updates a user profile. Only the record owner may update it.
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.user_id() != id {
        return Err(AppError::NoPermission);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(full_name) = payload.full_name {
        separated.push("full_name = ");
        separated.push_bind_unseparated(full_name);
    }
    if let Some(subject_ids) = payload.subject_ids {
        separated.push("subject_ids = ");
        separated.push_bind_unseparated(subject_ids);
    }
    if let Some(avatar) = payload.avatar {
        separated.push("avatar = ");
        separated.push_bind_unseparated(avatar);
    }
    if let Some(school) = payload.school {
        separated.push("school = ");
        separated.push_bind_unseparated(school);
    }
    if let Some(address) = payload.address {
        separated.push("address = ");
        separated.push_bind_unseparated(address);
    }
    if let Some(phone) = payload.phone {
        separated.push("phone = ");
        separated.push_bind_unseparated(phone);
    }
    if let Some(gender) = payload.gender {
        separated.push("gender = ");
        separated.push_bind_unseparated(gender);
    }
    separated.push("updated_at = now()");

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let user: Option<User> = builder.build_query_as().fetch_optional(&pool).await?;
    let user = user.ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(response::ok(user))
}

/// Soft-deletes a user. Admin only.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !allows(claims.role()?, Action::DeleteUser) {
        return Err(AppError::NoPermission);
    }

    let result = sqlx::query("UPDATE users SET status = 'INACTIVE', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(response::ok(()))
}

/// Follows a list of teachers. Student only.
///
/// Two independent read-modify-write passes (the student's `following`,
/// then each teacher's `followers`); no transaction and no deduplication,
/// so following the same teacher twice leaves two entries.
pub async fn follow(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<FollowRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !allows(claims.role()?, Action::Follow) {
        return Err(AppError::NoPermission);
    }
    if payload.follow_ids.is_empty() {
        return Err(AppError::FollowIdsRequired);
    }

    let auth_id = claims.user_id();

    let following: Option<Vec<i64>> =
        sqlx::query_scalar("SELECT following FROM users WHERE id = $1")
            .bind(auth_id)
            .fetch_optional(&pool)
            .await?;
    let mut following = following.ok_or(AppError::Unauthorized)?;
    following.extend(&payload.follow_ids);

    sqlx::query("UPDATE users SET following = $1, updated_at = now() WHERE id = $2")
        .bind(&following)
        .bind(auth_id)
        .execute(&pool)
        .await?;

    for &teacher_id in &payload.follow_ids {
        let followers: Option<Vec<i64>> =
            sqlx::query_scalar("SELECT followers FROM users WHERE id = $1")
                .bind(teacher_id)
                .fetch_optional(&pool)
                .await?;
        if let Some(mut followers) = followers {
            followers.push(auth_id);
            sqlx::query("UPDATE users SET followers = $1, updated_at = now() WHERE id = $2")
                .bind(&followers)
                .bind(teacher_id)
                .execute(&pool)
                .await?;
        }
    }

    Ok(response::ok(()))
}

/// Unfollows a list of teachers. Student only. Removes every matching
/// entry from both sides, mirroring `follow`.
pub async fn unfollow(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<FollowRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !allows(claims.role()?, Action::Follow) {
        return Err(AppError::NoPermission);
    }
    if payload.follow_ids.is_empty() {
        return Err(AppError::FollowIdsRequired);
    }

    let auth_id = claims.user_id();

    let following: Option<Vec<i64>> =
        sqlx::query_scalar("SELECT following FROM users WHERE id = $1")
            .bind(auth_id)
            .fetch_optional(&pool)
            .await?;
    let mut following = following.ok_or(AppError::Unauthorized)?;
    following.retain(|id| !payload.follow_ids.contains(id));

    sqlx::query("UPDATE users SET following = $1, updated_at = now() WHERE id = $2")
        .bind(&following)
        .bind(auth_id)
        .execute(&pool)
        .await?;

    for &teacher_id in &payload.follow_ids {
        let followers: Option<Vec<i64>> =
            sqlx::query_scalar("SELECT followers FROM users WHERE id = $1")
                .bind(teacher_id)
                .fetch_optional(&pool)
                .await?;
        if let Some(mut followers) = followers {
            followers.retain(|id| *id != auth_id);
            sqlx::query("UPDATE users SET followers = $1, updated_at = now() WHERE id = $2")
                .bind(&followers)
                .bind(teacher_id)
                .execute(&pool)
                .await?;
        }
    }

    Ok(response::ok(()))
}
