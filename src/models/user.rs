// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Password, AES-encrypted at rest (reversible, see utils::crypto).
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub full_name: String,

    /// User role: 'ADMIN', 'TEACHER' or 'STUDENT'.
    pub role: String,

    /// 'ACTIVE' or 'INACTIVE'. Deletion flips this, rows are never removed.
    pub status: String,

    /// Subjects the user teaches (teacher) or studies (student).
    pub subject_ids: Vec<i64>,

    /// Student ids following this user (teacher side).
    pub followers: Vec<i64>,

    /// Teacher ids this user follows (student side).
    pub following: Vec<i64>,

    /// Number of exams composed (teacher counter).
    pub num_of_exam: i64,

    pub avatar: Option<String>,
    pub school: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new user (registration and role-gated creation).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    /// Optional so that an absent password maps to PASSWORD_IS_REQUIRED
    /// rather than a deserialization error.
    pub password: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,

    /// Requested role. Registration only accepts 'STUDENT'.
    pub role: String,

    pub subject_ids: Option<Vec<i64>>,
    pub avatar: Option<String>,
    pub school: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
}

/// DTO for updating the caller's own profile. Fields are optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub subject_ids: Option<Vec<i64>>,
    pub avatar: Option<String>,
    pub school: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for follow/unfollow.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    #[serde(default)]
    pub follow_ids: Vec<i64>,
}

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListParams {
    pub role: Option<String>,
    pub keyword: Option<String>,
    pub subject_id: Option<i64>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}
