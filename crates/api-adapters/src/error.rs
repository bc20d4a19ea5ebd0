//! Maps engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::AppError;
use serde_json::json;

/// Response wrapper for [`AppError`]. Persistence causes were already logged
/// where they were converted and are never rendered.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidOperation(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            AppError::NotFound(..) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Persistence(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.0.to_string(),
            }
        }));

        (self.status(), body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (AppError::not_found("post", 7), StatusCode::NOT_FOUND),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::InvalidOperation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn persistence_cause_is_not_rendered() {
        let err = ApiError(AppError::Persistence(std::io::Error::other("disk on fire").into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.0.to_string(), "persistence failure");
    }
}
