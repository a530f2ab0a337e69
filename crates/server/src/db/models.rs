use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub code: String,
    pub title: String,
    pub course_ref: String,
    pub lecture_ref: Option<String>,
    pub presenter_id: String,
    pub status: String,
    pub created_at: String,
    pub ended_at: Option<String>,
    /// Computed by the select, not a stored column
    #[sqlx(default)]
    pub messages_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    /// Insertion order, used as the final ranking tie-break
    pub seq: i64,
    pub id: String,
    pub session_id: String,
    pub text: String,
    /// `None` for anonymous messages
    pub display_name: Option<String>,
    pub likes: i64,
    pub is_highlighted: bool,
    pub is_answered: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CourseCounts {
    pub course_ref: String,
    pub active_sessions: i64,
    pub total_sessions: i64,
}

/// Outcome of inserting a session whose code may collide with an active one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    CodeTaken,
}
