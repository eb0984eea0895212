// src/response.rs

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// Pagination block carried beside `data` on list endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

/// Wraps a successful response as `{statusCode, data, message: "OK"}`.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "statusCode": 200,
        "data": data,
        "message": "OK",
    }))
}

/// Wraps a successful list response, adding `pagination` beside `data`.
pub fn paged<T: Serialize>(data: Vec<T>, pagination: Pagination) -> Json<Value> {
    Json(json!({
        "statusCode": 200,
        "data": data,
        "message": "OK",
        "pagination": pagination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let Json(body) = ok(json!({"id": 1}));
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["message"], "OK");
        assert_eq!(body["data"]["id"], 1);
        assert!(body.get("pagination").is_none());
    }

    #[test]
    fn absent_record_serializes_as_null_data() {
        let Json(body) = ok(Option::<i64>::None);
        assert!(body["data"].is_null());
    }

    #[test]
    fn list_envelope_carries_pagination() {
        let Json(body) = paged(
            vec![1, 2, 3],
            Pagination {
                page: 2,
                size: 3,
                total: 11,
            },
        );
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["pagination"]["page"], 2);
        assert_eq!(body["pagination"]["total"], 11);
    }
}
