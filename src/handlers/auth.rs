// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        auth_session::LoginResponse,
        user::{LoginRequest, User},
    },
    response,
    utils::{crypto::decrypt_password, jwt::Claims, jwt::sign_jwt},
};

pub(crate) const USER_COLUMNS: &str = "\
    id, username, password, full_name, role, status, subject_ids, \
    followers, following, num_of_exam, avatar, school, address, phone, \
    gender, created_at, updated_at";

/// Authenticates a user and returns a signed token.
///
/// Decrypts the stored password and compares plaintexts. A missing user and
/// a wrong password produce the same error, so the response does not reveal
/// whether the username exists. On success the denormalized session row is
/// upserted (one row per username, overwritten on re-login).
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND status = 'ACTIVE'"
    ))
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::Internal(e.to_string())
    })?;

    let user = user.ok_or(AppError::IncorrectCredentials)?;

    let stored_password = decrypt_password(&config.password_secret, &user.password)?;
    if stored_password != payload.password {
        return Err(AppError::IncorrectCredentials);
    }

    let access_token = sign_jwt(
        user.id,
        &user.username,
        &user.role,
        &user.full_name,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;
    let expired_at = Utc::now() + Duration::seconds(config.jwt_expiration as i64);

    sqlx::query(
        "INSERT INTO auth_sessions (username, access_token, expired_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (username) DO UPDATE SET
            access_token = EXCLUDED.access_token,
            expired_at = EXCLUDED.expired_at,
            updated_at = now()",
    )
    .bind(&user.username)
    .bind(&access_token)
    .bind(expired_at)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert auth session: {:?}", e);
        AppError::Internal(e.to_string())
    })?;

    Ok(response::ok(LoginResponse {
        access_token,
        expired_at,
    }))
}

/// Ends the caller's session by deleting the denormalized session row.
/// The token itself stays valid until expiry; clients discard it.
pub async fn logout(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("DELETE FROM auth_sessions WHERE username = $1")
        .bind(&claims.username)
        .execute(&pool)
        .await?;

    Ok(response::ok(()))
}

/// Returns the current user, re-fetched by the username embedded in the
/// token. Role or name changes made after token issuance are picked up; a
/// stale token for a deleted user fails with 401.
pub async fn me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND status = 'ACTIVE'"
    ))
    .bind(&claims.username)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok(response::ok(user))
}
