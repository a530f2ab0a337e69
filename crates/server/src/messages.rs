//! Per-session message store: append, like, moderate, and ranked listing.
//!
//! Messages are never edited or deleted. Likes only grow, and every increment
//! happens inside the database so concurrent likers cannot lose updates.

use shared::{ranking, validation, AuthorMode, MessageInfo};
use uuid::Uuid;

use crate::{
    db::{self, Database},
    error::AppError,
};

fn message_info(row: db::Message) -> Result<MessageInfo, AppError> {
    let parse = |raw: &str| {
        Uuid::parse_str(raw).map_err(|e| AppError::Internal(format!("corrupt id {}: {}", raw, e)))
    };
    let author = match row.display_name {
        Some(display_name) => AuthorMode::Named { display_name },
        None => AuthorMode::Anonymous,
    };
    Ok(MessageInfo {
        id: parse(&row.id)?,
        session_id: parse(&row.session_id)?,
        text: row.text,
        author,
        likes: u64::try_from(row.likes).unwrap_or(0),
        is_highlighted: row.is_highlighted,
        is_answered: row.is_answered,
        created_at: db::parse_timestamp(&row.created_at)?,
    })
}

pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn submit(
        &self,
        session_id: Uuid,
        text: &str,
        author: AuthorMode,
    ) -> Result<MessageInfo, AppError> {
        let text = validation::message_text(text)?;
        let row = db::Message {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            text,
            display_name: author.display_name().map(str::to_string),
            likes: 0,
            is_highlighted: false,
            is_answered: false,
            created_at: db::timestamp(db::now()),
        };

        if !self.db.insert_message_if_active(&row).await? {
            return Err(self.inactive_session_error(session_id).await);
        }

        tracing::debug!("Message {} submitted to session {}", row.id, session_id);
        message_info(row)
    }

    /// Atomic increment. No per-participant dedup: the same client may like
    /// a message repeatedly.
    pub async fn like(&self, session_id: Uuid, message_id: Uuid) -> Result<u64, AppError> {
        let likes = self
            .db
            .increment_likes(&session_id.to_string(), &message_id.to_string())
            .await?;

        match likes {
            Some(likes) => Ok(u64::try_from(likes).unwrap_or(0)),
            None => {
                // Tell apart unknown message from closed session
                self.require_message(session_id, message_id).await?;
                Err(AppError::SessionClosed(session_id))
            }
        }
    }

    /// Idempotent. Any number of messages may be highlighted at once.
    pub async fn set_highlighted(
        &self,
        session_id: Uuid,
        message_id: Uuid,
        highlighted: bool,
    ) -> Result<MessageInfo, AppError> {
        let row = self
            .db
            .set_highlighted(&session_id.to_string(), &message_id.to_string(), highlighted)
            .await?
            .ok_or(AppError::MessageNotFound(message_id))?;
        tracing::info!(
            "Message {} in session {} {}",
            message_id,
            session_id,
            if highlighted { "highlighted" } else { "unhighlighted" }
        );
        message_info(row)
    }

    /// One-way flag; repeating it is a no-op
    pub async fn mark_answered(
        &self,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<MessageInfo, AppError> {
        let row = self
            .db
            .mark_answered(&session_id.to_string(), &message_id.to_string())
            .await?
            .ok_or(AppError::MessageNotFound(message_id))?;
        tracing::info!("Message {} in session {} marked answered", message_id, session_id);
        message_info(row)
    }

    /// Likes descending, then oldest first. Pure read.
    pub async fn list(&self, session_id: Uuid) -> Result<Vec<MessageInfo>, AppError> {
        if self.db.get_session(&session_id.to_string()).await?.is_none() {
            return Err(AppError::SessionNotFound(session_id));
        }

        let rows = self
            .db
            .get_messages_for_session(&session_id.to_string())
            .await?;
        let mut messages = rows
            .into_iter()
            .map(message_info)
            .collect::<Result<Vec<_>, _>>()?;
        ranking::rank(&mut messages);
        Ok(messages)
    }

    async fn require_message(&self, session_id: Uuid, message_id: Uuid) -> Result<(), AppError> {
        if self.db.get_session(&session_id.to_string()).await?.is_none() {
            return Err(AppError::SessionNotFound(session_id));
        }
        self.db
            .get_message(&session_id.to_string(), &message_id.to_string())
            .await?
            .map(|_| ())
            .ok_or(AppError::MessageNotFound(message_id))
    }

    async fn inactive_session_error(&self, session_id: Uuid) -> AppError {
        match self.db.get_session(&session_id.to_string()).await {
            Ok(Some(_)) => AppError::SessionClosed(session_id),
            Ok(None) => AppError::SessionNotFound(session_id),
            Err(e) => AppError::Database(e),
        }
    }
}
