//! Presenter identity. Tokens are HS256 JWTs minted by the identity provider
//! with the shared secret; this service only verifies them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Presenter,
    Participant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // presenter id
    pub role: Role,
    pub exp: usize,
}

pub fn generate_token(
    subject: &str,
    role: Role,
    auth_config: &AuthConfig,
) -> Result<String, AppError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: subject.to_string(),
        role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Extractor for routes only a presenter may call
#[derive(Debug, Clone)]
pub struct Presenter(pub String);

#[async_trait]
impl FromRequestParts<AppState> for Presenter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                })?;

        let claims = verify_token(bearer.token(), &state.config.auth.jwt_secret)?;
        if claims.role != Role::Presenter {
            return Err(AppError::Forbidden(
                "This action is reserved for the presenter".to_string(),
            ));
        }
        Ok(Presenter(claims.sub))
    }
}
