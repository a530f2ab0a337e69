//! Join protocol. No identity is created for participants.

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use shared::{JoinRequest, JoinResponse, SessionRef, ValidateCodeQuery, ValidateCodeResponse};

use crate::{error::AppError, state::AppState};

/// Unknown and ended codes answer `valid: false` rather than an error status
/// GET /api/v1/validate-code?code=
pub async fn validate_code(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ValidateCodeQuery>, AppError>,
) -> Result<Json<ValidateCodeResponse>, AppError> {
    match state.registry.validate_code(&query.code).await {
        Ok(session) => Ok(Json(ValidateCodeResponse {
            valid: true,
            session: Some(SessionRef {
                id: session.id,
                title: session.title,
                course_ref: session.course_ref,
            }),
        })),
        Err(AppError::CodeNotFound) => Ok(Json(ValidateCodeResponse {
            valid: false,
            session: None,
        })),
        Err(e) => Err(e),
    }
}

/// POST /api/v1/join
pub async fn join_session(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<JoinRequest>, AppError>,
) -> Result<Json<JoinResponse>, AppError> {
    let session = state.registry.validate_code(&req.code).await?;
    tracing::debug!("Participant joined session {} via code {}", session.id, session.code);
    Ok(Json(JoinResponse {
        session_id: session.id,
    }))
}
