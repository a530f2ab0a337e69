//! Participant side of a session: join by code, ask, like, and the
//! "my questions" view. Nothing about the participant is stored server-side,
//! so the ids of our own messages live only in this struct.

use async_trait::async_trait;
use shared::{
    validation, AuthorMode, JoinResponse, MessageInfo, SessionRef, SubmitMessageRequest,
    ValidateCodeResponse,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ClientError;

#[async_trait]
pub trait ParticipantApi: Send + Sync {
    async fn validate_code(&self, code: &str) -> Result<ValidateCodeResponse, ClientError>;
    async fn join(&self, code: &str) -> Result<JoinResponse, ClientError>;
    async fn submit(
        &self,
        session_id: Uuid,
        request: &SubmitMessageRequest,
    ) -> Result<MessageInfo, ClientError>;
    async fn like(&self, session_id: Uuid, message_id: Uuid) -> Result<u64, ClientError>;
}

pub struct ParticipantClient {
    api: Arc<dyn ParticipantApi>,
    session: SessionRef,
    author: AuthorMode,
    mine: HashSet<Uuid>,
}

impl ParticipantClient {
    /// Validate the code, then join. An unknown or ended code is `InvalidCode`.
    pub async fn join(
        api: Arc<dyn ParticipantApi>,
        code: &str,
        author: AuthorMode,
    ) -> Result<Self, ClientError> {
        let code = validation::normalize_code(code);
        if !validation::is_well_formed_code(&code) {
            return Err(ClientError::InvalidCode(code));
        }

        let validated = api.validate_code(&code).await?;
        let session = match validated.session {
            Some(session) if validated.valid => session,
            _ => return Err(ClientError::InvalidCode(code)),
        };

        // The session may end between the two calls
        let joined = match api.join(&code).await {
            Ok(joined) => joined,
            Err(e) if e.is_not_found() => return Err(ClientError::InvalidCode(code)),
            Err(e) => return Err(e),
        };
        if joined.session_id != session.id {
            tracing::warn!(
                "Code {} resolved to session {} on join, expected {}",
                code,
                joined.session_id,
                session.id
            );
        }

        tracing::info!("Joined session {} ({})", session.id, session.title);
        Ok(Self {
            api,
            session: SessionRef {
                id: joined.session_id,
                ..session
            },
            author,
            mine: HashSet::new(),
        })
    }

    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    pub fn author(&self) -> &AuthorMode {
        &self.author
    }

    pub async fn submit(&mut self, text: &str) -> Result<MessageInfo, ClientError> {
        let text = validation::message_text(text)?;
        let request = SubmitMessageRequest::new(text, &self.author);
        let message = self.api.submit(self.session.id, &request).await?;
        self.mine.insert(message.id);
        Ok(message)
    }

    /// Likes are not deduplicated; every call adds one
    pub async fn like(&self, message_id: Uuid) -> Result<u64, ClientError> {
        self.api.like(self.session.id, message_id).await
    }

    pub fn is_mine(&self, message_id: Uuid) -> bool {
        self.mine.contains(&message_id)
    }

    /// Our own messages, in the order of the shared list
    pub fn my_messages<'a>(&self, messages: &'a [MessageInfo]) -> Vec<&'a MessageInfo> {
        messages.iter().filter(|m| self.is_mine(m.id)).collect()
    }
}
