use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod health;
mod messages;
mod participant;
mod sessions;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Presenter session lifecycle
        .route("/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route("/sessions/:session_id/end", post(sessions::end_session))
        .route("/courses", get(sessions::list_courses))
        // Join protocol
        .route("/validate-code", get(participant::validate_code))
        .route("/join", post(participant::join_session))
        // Messages
        .route(
            "/sessions/:session_id/messages",
            get(messages::list_messages).post(messages::submit_message),
        )
        .route(
            "/sessions/:session_id/messages/:message_id/like",
            post(messages::like_message),
        )
        .route(
            "/sessions/:session_id/messages/:message_id/highlight",
            post(messages::highlight_message),
        )
        .route(
            "/sessions/:session_id/messages/:message_id/unhighlight",
            post(messages::unhighlight_message),
        )
        .route(
            "/sessions/:session_id/messages/:message_id/answer",
            post(messages::mark_answered),
        );

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .nest(shared::API_PREFIX, api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
