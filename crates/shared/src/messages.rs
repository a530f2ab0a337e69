use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::{self, ValidationError};

/// Version of the wire schema. Every route lives under [`API_PREFIX`].
pub const API_VERSION: &str = "v1";
pub const API_PREFIX: &str = "/api/v1";

// ============================================================================
// Sessions
// ============================================================================

/// Lifecycle state of a live Q&A session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting messages, code is joinable
    Active,
    /// Read-only, code released for reuse
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Full view of a session, as returned to presenters and pollers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub course_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lecture_ref: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub messages_count: u64,
    /// Human readable run time, e.g. "1h 5m" or "12m"
    pub duration: String,
}

/// Minimal session reference handed to participants during the join flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRef {
    pub id: Uuid,
    pub title: String,
    pub course_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub title: String,
    pub course_ref: String,
    #[serde(default)]
    pub lecture_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub ended_at: DateTime<Utc>,
}

/// Query string for `GET /api/v1/sessions`. An empty value (`?status=`)
/// means the filter is not set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSessionsQuery {
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub course_ref: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<SessionStatus>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Per-course session counts for the presenter dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSummary {
    pub course_ref: String,
    pub active_sessions: u64,
    pub total_sessions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateCodeQuery {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidateCodeResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub session_id: Uuid,
}

// ============================================================================
// Messages
// ============================================================================

/// How a message author chose to appear
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthorMode {
    Anonymous,
    Named { display_name: String },
}

impl AuthorMode {
    pub fn display_name(&self) -> Option<&str> {
        match self {
            AuthorMode::Anonymous => None,
            AuthorMode::Named { display_name } => Some(display_name),
        }
    }
}

/// A participant question or comment within a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageInfo {
    pub id: Uuid,
    pub session_id: Uuid,
    pub text: String,
    pub author: AuthorMode,
    pub likes: u64,
    pub is_highlighted: bool,
    pub is_answered: bool,
    pub created_at: DateTime<Utc>,
}

/// The one accepted payload for submitting a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitMessageRequest {
    pub text: String,
    pub is_anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SubmitMessageRequest {
    pub fn new(text: impl Into<String>, author: &AuthorMode) -> Self {
        Self {
            text: text.into(),
            is_anonymous: matches!(author, AuthorMode::Anonymous),
            display_name: author.display_name().map(str::to_string),
        }
    }

    /// Resolve the author mode, validating the display name for named posts
    pub fn author_mode(&self) -> Result<AuthorMode, ValidationError> {
        if self.is_anonymous {
            return Ok(AuthorMode::Anonymous);
        }
        let name = self.display_name.as_deref().unwrap_or_default();
        Ok(AuthorMode::Named {
            display_name: validation::display_name(name)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeResponse {
    pub likes: u64,
}

/// Result of a poll: the session header plus the ranked message list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageList {
    pub session: SessionInfo,
    pub messages: Vec<MessageInfo>,
}

// ============================================================================
// Errors and health
// ============================================================================

/// Error taxonomy shared by server responses and client handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Unauthorized,
    Internal,
}

/// JSON body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_version: String,
}
