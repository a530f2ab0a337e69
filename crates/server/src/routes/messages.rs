use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use shared::{LikeResponse, MessageInfo, MessageList, SubmitMessageRequest};
use uuid::Uuid;

use super::auth::Presenter;
use crate::{error::AppError, state::AppState};

type SessionPath = WithRejection<Path<Uuid>, AppError>;
type MessagePath = WithRejection<Path<(Uuid, Uuid)>, AppError>;

/// Poll target: session header plus ranked messages
/// GET /api/v1/sessions/:session_id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    WithRejection(Path(session_id), _): SessionPath,
) -> Result<Json<MessageList>, AppError> {
    let session = state.registry.get_session(session_id).await?;
    let messages = state.messages.list(session_id).await?;
    Ok(Json(MessageList { session, messages }))
}

/// POST /api/v1/sessions/:session_id/messages
pub async fn submit_message(
    State(state): State<AppState>,
    WithRejection(Path(session_id), _): SessionPath,
    WithRejection(Json(req), _): WithRejection<Json<SubmitMessageRequest>, AppError>,
) -> Result<(StatusCode, Json<MessageInfo>), AppError> {
    let author = req.author_mode()?;
    let message = state.messages.submit(session_id, &req.text, author).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/sessions/:session_id/messages/:message_id/like
pub async fn like_message(
    State(state): State<AppState>,
    WithRejection(Path((session_id, message_id)), _): MessagePath,
) -> Result<Json<LikeResponse>, AppError> {
    let likes = state.messages.like(session_id, message_id).await?;
    Ok(Json(LikeResponse { likes }))
}

/// POST /api/v1/sessions/:session_id/messages/:message_id/highlight
pub async fn highlight_message(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Path((session_id, message_id)), _): MessagePath,
) -> Result<Json<MessageInfo>, AppError> {
    state.registry.require_owner(&presenter_id, session_id).await?;
    let message = state
        .messages
        .set_highlighted(session_id, message_id, true)
        .await?;
    Ok(Json(message))
}

/// POST /api/v1/sessions/:session_id/messages/:message_id/unhighlight
pub async fn unhighlight_message(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Path((session_id, message_id)), _): MessagePath,
) -> Result<Json<MessageInfo>, AppError> {
    state.registry.require_owner(&presenter_id, session_id).await?;
    let message = state
        .messages
        .set_highlighted(session_id, message_id, false)
        .await?;
    Ok(Json(message))
}

/// POST /api/v1/sessions/:session_id/messages/:message_id/answer
pub async fn mark_answered(
    State(state): State<AppState>,
    Presenter(presenter_id): Presenter,
    WithRejection(Path((session_id, message_id)), _): MessagePath,
) -> Result<Json<MessageInfo>, AppError> {
    state.registry.require_owner(&presenter_id, session_id).await?;
    let message = state.messages.mark_answered(session_id, message_id).await?;
    Ok(Json(message))
}
