// src/models/auth_session.rs

use serde::Serialize;

// The auth_sessions table is a denormalized mirror of the issued token,
// one row per username: upserted on login, deleted on logout. The token
// is self-verifying, so the row is never read back and needs no struct.

/// DTO returned by login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expired_at: chrono::DateTime<chrono::Utc>,
}
