use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use shared::validation::{self, ValidationError, CODE_ALPHABET};
use shared::{CourseSummary, ListSessionsQuery, SessionInfo, SessionStatus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    config::QnaConfig,
    db::{self, Database, InsertOutcome},
    directory::CourseDirectory,
    error::AppError,
};

/// Source of candidate join codes
pub trait CodeSource: Send + Sync {
    fn next_code(&self, length: usize) -> String;
}

pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self, length: usize) -> String {
        generate_code(&mut rand::thread_rng(), length)
    }
}

/// Hands out a fixed list of codes, then falls back to random ones.
/// Used for demos and tests that need a predictable code.
#[derive(Default)]
pub struct FixedCodes {
    queue: Mutex<VecDeque<String>>,
}

impl FixedCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(codes.into_iter().map(Into::into).collect()),
        }
    }
}

impl CodeSource for FixedCodes {
    fn next_code(&self, length: usize) -> String {
        let next = self.queue.lock().ok().and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| RandomCodes.next_code(length))
    }
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// "1h 5m" style run time, minutes rounded down
pub fn format_duration(elapsed: Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub(crate) fn session_info(row: db::Session, now: DateTime<Utc>) -> Result<SessionInfo, AppError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| AppError::Internal(format!("corrupt session id {}: {}", row.id, e)))?;
    let status: SessionStatus = row.status.parse().map_err(AppError::Internal)?;
    let created_at = db::parse_timestamp(&row.created_at)?;
    let ended_at = row
        .ended_at
        .as_deref()
        .map(db::parse_timestamp)
        .transpose()?;

    Ok(SessionInfo {
        id,
        code: row.code,
        title: row.title,
        course_ref: row.course_ref,
        lecture_ref: row.lecture_ref,
        status,
        created_at,
        ended_at,
        messages_count: u64::try_from(row.messages_count).unwrap_or(0),
        duration: format_duration(ended_at.unwrap_or(now) - created_at),
    })
}

/// Creates and ends sessions and resolves join codes.
///
/// Code uniqueness among active sessions is enforced by a partial unique
/// index; a collision simply triggers another draw.
pub struct SessionRegistry {
    db: Database,
    directory: Arc<dyn CourseDirectory>,
    codes: Arc<dyn CodeSource>,
    code_length: usize,
    code_attempts: u32,
}

impl SessionRegistry {
    pub fn new(db: Database, directory: Arc<dyn CourseDirectory>, config: &QnaConfig) -> Self {
        Self {
            db,
            directory,
            codes: Arc::new(RandomCodes),
            code_length: config.code_length,
            code_attempts: config.code_attempts.max(1),
        }
    }

    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub async fn create_session(
        &self,
        presenter_id: &str,
        course_ref: &str,
        lecture_ref: Option<&str>,
        title: &str,
    ) -> Result<SessionInfo, AppError> {
        let title = validation::session_title(title)?;
        let course_ref = course_ref.trim();
        if course_ref.is_empty() {
            return Err(ValidationError::Empty { field: "course_ref" }.into());
        }
        let lecture_ref = lecture_ref.map(str::trim).filter(|l| !l.is_empty());
        self.directory
            .check_course(presenter_id, course_ref, lecture_ref)?;

        let id = Uuid::new_v4();
        let created_at = db::now();

        for attempt in 1..=self.code_attempts {
            let code = validation::normalize_code(&self.codes.next_code(self.code_length));
            let row = db::Session {
                id: id.to_string(),
                code,
                title: title.clone(),
                course_ref: course_ref.to_string(),
                lecture_ref: lecture_ref.map(str::to_string),
                presenter_id: presenter_id.to_string(),
                status: SessionStatus::Active.as_str().to_string(),
                created_at: db::timestamp(created_at),
                ended_at: None,
                messages_count: 0,
            };

            match self.db.insert_session(&row).await? {
                InsertOutcome::Inserted => {
                    tracing::info!(
                        "Session created: {} (code {}, course {}, presenter {})",
                        id,
                        row.code,
                        row.course_ref,
                        presenter_id
                    );
                    return session_info(row, created_at);
                }
                InsertOutcome::CodeTaken => {
                    tracing::debug!(
                        "Code {} already owned by an active session (attempt {}/{})",
                        row.code,
                        attempt,
                        self.code_attempts
                    );
                }
            }
        }

        tracing::warn!(
            "Gave up allocating a session code after {} attempts",
            self.code_attempts
        );
        Err(AppError::ExhaustedAttempts(self.code_attempts))
    }

    /// Terminal transition. A second call fails with `AlreadyEnded`.
    pub async fn end_session(
        &self,
        presenter_id: &str,
        session_id: Uuid,
    ) -> Result<DateTime<Utc>, AppError> {
        self.require_owner(presenter_id, session_id).await?;

        let ended_at = db::now();
        if self
            .db
            .end_session(&session_id.to_string(), &db::timestamp(ended_at))
            .await?
        {
            tracing::info!("Session ended: {}", session_id);
            Ok(ended_at)
        } else {
            Err(AppError::AlreadyEnded(session_id))
        }
    }

    /// Case-insensitive lookup among active sessions only
    pub async fn validate_code(&self, code: &str) -> Result<SessionInfo, AppError> {
        if !validation::is_well_formed_code(code) {
            return Err(AppError::CodeNotFound);
        }
        let row = self
            .db
            .find_active_session_by_code(&validation::normalize_code(code))
            .await?
            .ok_or(AppError::CodeNotFound)?;
        session_info(row, Utc::now())
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionInfo, AppError> {
        let row = self
            .db
            .get_session(&session_id.to_string())
            .await?
            .ok_or(AppError::SessionNotFound(session_id))?;
        session_info(row, Utc::now())
    }

    /// Load a session and check that `presenter_id` owns it
    pub async fn require_owner(
        &self,
        presenter_id: &str,
        session_id: Uuid,
    ) -> Result<SessionInfo, AppError> {
        let row = self
            .db
            .get_session(&session_id.to_string())
            .await?
            .ok_or(AppError::SessionNotFound(session_id))?;
        if row.presenter_id != presenter_id {
            return Err(AppError::Forbidden(
                "Only the session owner can moderate this session".to_string(),
            ));
        }
        session_info(row, Utc::now())
    }

    /// Most recent first
    pub async fn list_sessions_for_presenter(
        &self,
        presenter_id: &str,
        query: &ListSessionsQuery,
    ) -> Result<Vec<SessionInfo>, AppError> {
        let now = Utc::now();
        let rows = self
            .db
            .list_sessions_for_presenter(
                presenter_id,
                query.course_ref.as_deref(),
                query.status.map(|s| s.as_str()),
            )
            .await?;
        rows.into_iter().map(|row| session_info(row, now)).collect()
    }

    pub async fn course_summaries(&self, presenter_id: &str) -> Result<Vec<CourseSummary>, AppError> {
        let counts = self.db.course_counts_for_presenter(presenter_id).await?;
        Ok(counts
            .into_iter()
            .map(|c| CourseSummary {
                course_ref: c.course_ref,
                active_sessions: u64::try_from(c.active_sessions).unwrap_or(0),
                total_sessions: u64::try_from(c.total_sessions).unwrap_or(0),
            })
            .collect())
    }
}
