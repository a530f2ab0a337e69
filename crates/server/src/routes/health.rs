use axum::Json;
use shared::{HealthResponse, API_VERSION};

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        api_version: API_VERSION.to_string(),
    })
}
