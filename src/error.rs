// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Every error maps to an HTTP status plus a symbolic `code` clients switch
/// on, and a human-readable message.
#[derive(Debug)]
pub enum AppError {
    // 400
    IncorrectCredentials,
    PasswordRequired,
    FollowIdsRequired,
    CantEditOncePublished,
    BadRequest(String),

    // 401 Token absent/invalid, or the token's user no longer exists
    Unauthorized,

    // 403 Role/ownership check failed
    NoPermission,

    // 404
    NotFound(String),

    // 409 Duplicate username
    UsernameTaken,

    // 500
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::IncorrectCredentials => (
                StatusCode::BAD_REQUEST,
                "USERNAME_OR_PASSWORD_INCORRECT",
                "Username or password incorrect".to_string(),
            ),
            AppError::PasswordRequired => (
                StatusCode::BAD_REQUEST,
                "PASSWORD_IS_REQUIRED",
                "Password is required".to_string(),
            ),
            AppError::FollowIdsRequired => (
                StatusCode::BAD_REQUEST,
                "FOLLOW_IDS_IS_REQUIRED",
                "followIds is required".to_string(),
            ),
            AppError::CantEditOncePublished => (
                StatusCode::BAD_REQUEST,
                "CANT_EDIT_PUBLISHED_EXAM",
                "Exam can not be edited once published".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            AppError::NoPermission => (
                StatusCode::FORBIDDEN,
                "NO_EXECUTE_PERMISSION",
                "No execute permission".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                "USER_ALREADY_EXISTS",
                "User already exists".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Internal Server Error".to_string(),
            ),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response `{code, message}` with the
/// mapped HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(msg) = &self {
            tracing::error!("Internal Server Error: {}", msg);
        }
        let (status, code, message) = self.parts();
        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Allows using the `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AppError::IncorrectCredentials.parts().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NoPermission.parts().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UsernameTaken.parts().0, StatusCode::CONFLICT);
        assert_eq!(
            AppError::CantEditOncePublished.parts().0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_error_hides_details() {
        let (_, _, message) = AppError::Internal("connection reset".into()).parts();
        assert_eq!(message, "Internal Server Error");
    }
}
