//! Presenter session lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use shared::{
    CourseSummary, CreateSessionRequest, CreateSessionResponse, EndSessionResponse,
    ListSessionsQuery, SessionInfo,
};
use uuid::Uuid;

use super::auth::Presenter;
use crate::{error::AppError, state::AppState};

/// Open a new live session; it is active immediately
/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Json(req), _): WithRejection<Json<CreateSessionRequest>, AppError>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let session = state
        .registry
        .create_session(
            &presenter_id,
            &req.course_ref,
            req.lecture_ref.as_deref(),
            &req.title,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            code: session.code,
            created_at: session.created_at,
        }),
    ))
}

/// Sessions owned by the caller, most recent first
/// GET /api/v1/sessions?course_ref=&status=
pub async fn list_sessions(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Query(query), _): WithRejection<Query<ListSessionsQuery>, AppError>,
) -> Result<Json<Vec<SessionInfo>>, AppError> {
    let sessions = state
        .registry
        .list_sessions_for_presenter(&presenter_id, &query)
        .await?;
    Ok(Json(sessions))
}

/// POST /api/v1/sessions/:session_id/end
pub async fn end_session(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Path(session_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<EndSessionResponse>, AppError> {
    let ended_at = state.registry.end_session(&presenter_id, session_id).await?;
    Ok(Json(EndSessionResponse { ended_at }))
}

/// Per-course active/total session counts
/// GET /api/v1/courses
pub async fn list_courses(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
) -> Result<Json<Vec<CourseSummary>>, AppError> {
    Ok(Json(state.registry.course_summaries(&presenter_id).await?))
}
