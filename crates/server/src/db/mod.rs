use anyhow::Result;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

mod models;

pub use models::*;

const SESSION_SELECT: &str = r#"
    SELECT s.id, s.code, s.title, s.course_ref, s.lecture_ref, s.presenter_id,
           s.status, s.created_at, s.ended_at,
           (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id) AS messages_count
    FROM sessions s
"#;

const MESSAGE_COLUMNS: &str =
    "seq, id, session_id, text, display_name, likes, is_highlighted, is_answered, created_at";

/// Timestamps are stored as fixed-precision RFC 3339 so that string order is time order
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at storage precision, so values read back compare equal
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                title TEXT NOT NULL,
                course_ref TEXT NOT NULL,
                lecture_ref TEXT,
                presenter_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'ended')),
                created_at TEXT NOT NULL,
                ended_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // A code may be reused once its owner has ended
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_active_code ON sessions(code) WHERE status = 'active'",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_presenter ON sessions(presenter_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                text TEXT NOT NULL,
                display_name TEXT,
                likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
                is_highlighted INTEGER NOT NULL DEFAULT 0,
                is_answered INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, seq)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // Session operations
    pub async fn insert_session(&self, session: &Session) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, code, title, course_ref, lecture_ref, presenter_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.code)
        .bind(&session.title)
        .bind(&session.course_ref)
        .bind(&session.lecture_ref)
        .bind(&session.presenter_id)
        .bind(&session.status)
        .bind(&session.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(InsertOutcome::CodeTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Flip an active session to ended. Returns false if it was not active.
    pub async fn end_session(&self, id: &str, ended_at: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'ended', ended_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(ended_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let sql = format!("{} WHERE s.id = ?", SESSION_SELECT);
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn find_active_session_by_code(&self, code: &str) -> Result<Option<Session>> {
        let sql = format!("{} WHERE s.code = ? AND s.status = 'active'", SESSION_SELECT);
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn list_sessions_for_presenter(
        &self,
        presenter_id: &str,
        course_ref: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<Session>> {
        let sql = format!(
            r#"{}
            WHERE s.presenter_id = ?
              AND (? IS NULL OR s.course_ref = ?)
              AND (? IS NULL OR s.status = ?)
            ORDER BY s.created_at DESC, s.rowid DESC"#,
            SESSION_SELECT
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(presenter_id)
            .bind(course_ref)
            .bind(course_ref)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    pub async fn course_counts_for_presenter(&self, presenter_id: &str) -> Result<Vec<CourseCounts>> {
        let counts = sqlx::query_as::<_, CourseCounts>(
            r#"
            SELECT course_ref,
                   SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END) AS active_sessions,
                   COUNT(*) AS total_sessions
            FROM sessions
            WHERE presenter_id = ?
            GROUP BY course_ref
            ORDER BY course_ref
            "#,
        )
        .bind(presenter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    // Message operations

    /// Insert a message only while its session is active, in one statement.
    /// Returns false when the session is missing or ended.
    pub async fn insert_message_if_active(&self, message: &Message) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, text, display_name, created_at)
            SELECT ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ? AND status = 'active')
            "#,
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(&message.text)
        .bind(&message.display_name)
        .bind(&message.created_at)
        .bind(&message.session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get_message(&self, session_id: &str, id: &str) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE id = ? AND session_id = ?",
            MESSAGE_COLUMNS
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// Atomic in-database increment; `None` if the message is missing or its
    /// session is no longer active.
    pub async fn increment_likes(&self, session_id: &str, id: &str) -> Result<Option<i64>> {
        let likes = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE messages SET likes = likes + 1
            WHERE id = ? AND session_id = ?
              AND EXISTS (SELECT 1 FROM sessions WHERE id = ? AND status = 'active')
            RETURNING likes
            "#,
        )
        .bind(id)
        .bind(session_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(likes)
    }

    pub async fn set_highlighted(
        &self,
        session_id: &str,
        id: &str,
        highlighted: bool,
    ) -> Result<Option<Message>> {
        let sql = format!(
            "UPDATE messages SET is_highlighted = ? WHERE id = ? AND session_id = ? RETURNING {}",
            MESSAGE_COLUMNS
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(highlighted)
            .bind(id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    pub async fn mark_answered(&self, session_id: &str, id: &str) -> Result<Option<Message>> {
        let sql = format!(
            "UPDATE messages SET is_answered = 1 WHERE id = ? AND session_id = ? RETURNING {}",
            MESSAGE_COLUMNS
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// All messages of a session in insertion order
    pub async fn get_messages_for_session(&self, session_id: &str) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE session_id = ? ORDER BY seq ASC",
            MESSAGE_COLUMNS
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use tempfile::TempDir;

    /// File-backed database so several pool connections really race
    pub async fn test_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liveqa-test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        (db, dir)
    }
}
