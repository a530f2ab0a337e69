//! HTTP client for the Live Q&A service

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    ApiError, CourseSummary, CreateSessionRequest, CreateSessionResponse, EndSessionResponse,
    JoinRequest, JoinResponse, LikeResponse, ListSessionsQuery, MessageInfo, MessageList,
    SessionInfo, SubmitMessageRequest, ValidateCodeResponse,
};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ClientError;
use crate::participant::ParticipantApi;
use crate::poller::MessageSource;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: format!("{}{}", server.trim_end_matches('/'), shared::API_PREFIX),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn presenter(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ClientError::Api {
                kind: shared::ErrorKind::Unauthorized,
                message: "no presenter token configured; run 'liveqa config set token <token>'"
                    .to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Presenter
    // ------------------------------------------------------------------

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ClientError> {
        let builder = self.presenter(self.http.post(self.url("/sessions")))?;
        send(builder.json(request)).await
    }

    pub async fn list_sessions(
        &self,
        query: &ListSessionsQuery,
    ) -> Result<Vec<SessionInfo>, ClientError> {
        let builder = self.presenter(self.http.get(self.url("/sessions")))?;
        send(builder.query(query)).await
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<EndSessionResponse, ClientError> {
        let url = self.url(&format!("/sessions/{}/end", session_id));
        send(self.presenter(self.http.post(url))?).await
    }

    pub async fn course_summaries(&self) -> Result<Vec<CourseSummary>, ClientError> {
        send(self.presenter(self.http.get(self.url("/courses")))?).await
    }

    pub async fn highlight(
        &self,
        session_id: Uuid,
        message_id: Uuid,
        on: bool,
    ) -> Result<MessageInfo, ClientError> {
        let action = if on { "highlight" } else { "unhighlight" };
        let url = self.message_url(session_id, message_id, action);
        send(self.presenter(self.http.post(url))?).await
    }

    pub async fn mark_answered(
        &self,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<MessageInfo, ClientError> {
        let url = self.message_url(session_id, message_id, "answer");
        send(self.presenter(self.http.post(url))?).await
    }

    // ------------------------------------------------------------------
    // Anyone
    // ------------------------------------------------------------------

    pub async fn list_messages(&self, session_id: Uuid) -> Result<MessageList, ClientError> {
        let url = self.url(&format!("/sessions/{}/messages", session_id));
        send(self.http.get(url)).await
    }

    fn message_url(&self, session_id: Uuid, message_id: Uuid, action: &str) -> String {
        self.url(&format!(
            "/sessions/{}/messages/{}/{}",
            session_id, message_id, action
        ))
    }
}

/// Send a request and decode either the success body or the error envelope
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Transient(format!("undecodable response: {}", e)));
    }
    if status.is_server_error() {
        return Err(ClientError::Transient(format!("server returned {}", status)));
    }

    match response.json::<ApiError>().await {
        Ok(ApiError { kind, message }) => Err(ClientError::Api { kind, message }),
        Err(_) => Err(ClientError::Transient(format!(
            "server returned {} without an error body",
            status
        ))),
    }
}

#[async_trait]
impl MessageSource for ApiClient {
    async fn fetch_messages(&self, session_id: Uuid) -> Result<MessageList, ClientError> {
        self.list_messages(session_id).await
    }
}

#[async_trait]
impl ParticipantApi for ApiClient {
    async fn validate_code(&self, code: &str) -> Result<ValidateCodeResponse, ClientError> {
        let request = self.http.get(self.url("/validate-code")).query(&[("code", code)]);
        send(request).await
    }

    async fn join(&self, code: &str) -> Result<JoinResponse, ClientError> {
        let body = JoinRequest {
            code: code.to_string(),
        };
        send(self.http.post(self.url("/join")).json(&body)).await
    }

    async fn submit(
        &self,
        session_id: Uuid,
        request: &SubmitMessageRequest,
    ) -> Result<MessageInfo, ClientError> {
        let url = self.url(&format!("/sessions/{}/messages", session_id));
        send(self.http.post(url).json(request)).await
    }

    async fn like(&self, session_id: Uuid, message_id: Uuid) -> Result<u64, ClientError> {
        let url = self.message_url(session_id, message_id, "like");
        let response: LikeResponse = send(self.http.post(url)).await?;
        Ok(response.likes)
    }
}
