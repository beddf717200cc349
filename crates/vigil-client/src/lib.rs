//! Authenticated client for the agent backend: JSON endpoints, the SSE
//! command stream, and the error taxonomy the console recovers from.

pub mod sse;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vigil_core::{ApprovalRequest, ApprovalsEnvelope, SystemStatus};

/// Header carrying the opaque session token on every request except login.
pub const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport or poll failure. Callers keep previous state and retry on
    /// the natural cadence; never surfaced as a hard error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The server rejected the token. Local credential state is cleared;
    /// polling and streaming stop until re-login.
    #[error("authentication required")]
    AuthRequired,
    /// An approve/deny call returned non-success. Pending state is left
    /// untouched so the action can be retried.
    #[error("action failed: {0}")]
    Action(String),
    /// Response body did not match the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Event delivered by the spawned stream reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    /// Stream ended normally.
    Closed,
    /// Mid-session transport error; the session must be closed and a
    /// workspace recovery re-fetch triggered.
    Failed(String),
}

#[derive(Serialize)]
struct LoginBody<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct FilesEnvelope {
    #[serde(default)]
    files: Vec<String>,
}

/// Response of an approve call. The backend reports failures either as a
/// non-2xx status or as a 200 with an `error` field.
#[derive(Deserialize)]
struct ActionResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct ApproveBody {
    content: String,
}

/// HTTP client with shared read-only credential state. The token is
/// injected into every outbound request; a 401 clears it and all
/// authenticated traffic must stop until re-login.
pub struct ConsoleClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ConsoleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header(AUTH_HEADER, token),
            None => req,
        }
    }

    /// Check a response for auth rejection, clearing the token on 401.
    fn check_auth(&mut self, resp: &reqwest::Response) -> Result<()> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("server rejected token; clearing credential");
            self.token = None;
            return Err(ClientError::AuthRequired);
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        let resp = self.authed(self.http.get(self.url(path))).send().await?;
        self.check_auth(&resp)?;
        let resp = resp.error_for_status()?;
        Ok(resp.json().await?)
    }

    // ── Endpoints ──

    /// `POST /login`. Stores the returned token on success.
    pub async fn login(&mut self, password: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&LoginBody { password })
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthRequired);
        }
        let resp = resp.error_for_status()?;
        let body: LoginResponse = resp.json().await?;
        self.token = Some(body.token);
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `GET /system-status`.
    pub async fn system_status(&mut self) -> Result<SystemStatus> {
        self.get_json("/system-status").await
    }

    /// `GET /approvals`. Returns the raw server list; filtering to PENDING
    /// is the approval queue's business.
    pub async fn approvals(&mut self) -> Result<Vec<ApprovalRequest>> {
        let envelope: ApprovalsEnvelope = self.get_json("/approvals").await?;
        Ok(envelope.requests)
    }

    /// `GET /files` (collaborator; used for the workspace panel and the
    /// stream-error recovery re-fetch).
    pub async fn list_files(&mut self) -> Result<Vec<String>> {
        let envelope: FilesEnvelope = self.get_json("/files").await?;
        Ok(envelope.files)
    }

    /// `POST /approvals/{id}/approve`. `content` present only for
    /// reviewable actions; it becomes the JSON body verbatim.
    pub async fn approve(&mut self, id: &str, content: Option<String>) -> Result<Option<String>> {
        let mut req = self
            .authed(self.http.post(self.url(&format!("/approvals/{id}/approve"))));
        if let Some(content) = content {
            req = req.json(&ApproveBody { content });
        }
        let resp = req.send().await?;
        self.check_auth(&resp)?;
        let resp = resp.error_for_status()?;
        let body: ActionResponse = resp.json().await?;
        if let Some(error) = body.error {
            return Err(ClientError::Action(error));
        }
        debug!(id, "approve accepted");
        Ok(body.result)
    }

    /// `POST /approvals/{id}/deny`.
    pub async fn deny(&mut self, id: &str) -> Result<()> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/approvals/{id}/deny"))))
            .send()
            .await?;
        self.check_auth(&resp)?;
        let resp = resp.error_for_status()?;
        let body: ActionResponse = resp.json().await?;
        if let Some(error) = body.error {
            return Err(ClientError::Action(error));
        }
        debug!(id, "deny accepted");
        Ok(())
    }

    /// Open `GET /stream-test?prompt=...` and forward decoded chunks to
    /// `tx` until the stream ends, fails, or `cancel` fires. The backend
    /// exempts this endpoint from auth; the token is still sent when
    /// present.
    pub fn spawn_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let request = self
            .authed(self.http.get(self.url("/stream-test")))
            .query(&[("prompt", prompt)]);
        tokio::spawn(sse::run_stream(request, tx, cancel))
    }
}
