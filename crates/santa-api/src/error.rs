use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use santa_draw::DrawError;
use santa_types::api::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound,
    Draw(DrawError),
    Internal,
}

impl From<DrawError> for ApiError {
    fn from(e: DrawError) -> Self {
        Self::Draw(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Storage error: {:#}", e);
        Self::Internal
    }
}

pub fn draw_status(e: &DrawError) -> StatusCode {
    match e {
        DrawError::GroupNotFound(_) => StatusCode::NOT_FOUND,
        DrawError::AlreadyDrawn(_) => StatusCode::CONFLICT,
        DrawError::InsufficientParticipants { .. }
        | DrawError::Infeasible
        | DrawError::UnknownParticipant(_)
        | DrawError::SelfExclusion
        | DrawError::Solver(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DrawError::Crypto(_) | DrawError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => body(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid bearer token".into(),
            ),
            Self::Forbidden => body(
                StatusCode::FORBIDDEN,
                "forbidden",
                "only the group owner can do this".into(),
            ),
            Self::NotFound => body(StatusCode::NOT_FOUND, "not_found", "group not found".into()),
            Self::Draw(e) => {
                let status = draw_status(&e);
                if status.is_server_error() {
                    error!("Draw failed: {}", e);
                    body(status, e.code(), "internal error".into())
                } else {
                    body(status, e.code(), e.to_string())
                }
            }
            Self::Internal => body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_errors_map_to_distinct_statuses() {
        assert_eq!(draw_status(&DrawError::AlreadyDrawn(1)), StatusCode::CONFLICT);
        assert_eq!(draw_status(&DrawError::Infeasible), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            draw_status(&DrawError::InsufficientParticipants { count: 1 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(draw_status(&DrawError::GroupNotFound(3)), StatusCode::NOT_FOUND);
        assert_eq!(
            draw_status(&DrawError::Storage(anyhow::anyhow!("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
