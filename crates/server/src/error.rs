use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{ApiError, ErrorKind, ValidationError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("invalid or expired session code")]
    CodeNotFound,

    #[error("course {0} not found")]
    CourseNotFound(String),

    #[error("session {0} has ended and no longer accepts changes")]
    SessionClosed(Uuid),

    #[error("session {0} has already ended")]
    AlreadyEnded(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("could not allocate a free session code after {0} attempts")]
    ExhaustedAttempts(u32),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::SessionNotFound(_)
            | AppError::MessageNotFound(_)
            | AppError::CodeNotFound
            | AppError::CourseNotFound(_) => ErrorKind::NotFound,
            AppError::SessionClosed(_) | AppError::AlreadyEnded(_) => ErrorKind::InvalidState,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::Unauthorized(_) | AppError::Forbidden(_) => ErrorKind::Unauthorized,
            AppError::ExhaustedAttempts(_) | AppError::Database(_) | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidState => StatusCode::CONFLICT,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let body = ApiError {
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        assert_eq!(AppError::SessionNotFound(id).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::SessionClosed(id).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::AlreadyEnded(id).kind(), ErrorKind::InvalidState);
        assert_eq!(
            AppError::Validation(ValidationError::Empty { field: "text" }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Forbidden("no".into()).kind(), ErrorKind::Unauthorized);
        assert_eq!(
            AppError::ExhaustedAttempts(16).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
