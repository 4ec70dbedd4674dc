//! Remote record API client: the only place that talks to the resume backend.
//!
//! Endpoints (all wrapped in the `{ success, data, message, error }` envelope):
//! - `POST /api/resumes/`      create, returns the new record
//! - `PUT  /api/resumes/{id}`  update
//! - `GET  /api/resumes/{id}`  read

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::RemoteError;
use crate::models::Resume;
use crate::session::AuthToken;

/// What a create call hands back. The id is optional because a misbehaving
/// server can acknowledge without one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedRecord {
    #[serde(default)]
    pub id: Option<i64>,
}

#[async_trait]
pub trait RemoteResumeStore: Send + Sync {
    async fn create(&self, token: &AuthToken, resume: &Resume) -> Result<CreatedRecord, RemoteError>;
    async fn update(&self, token: &AuthToken, id: i64, resume: &Resume) -> Result<(), RemoteError>;
    async fn read(&self, token: &AuthToken, id: i64) -> Result<Resume, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemoteResumeStore for HttpRemoteStore {
    async fn create(&self, token: &AuthToken, resume: &Resume) -> Result<CreatedRecord, RemoteError> {
        let response = self
            .client
            .post(self.url("/api/resumes/"))
            .bearer_auth(token.as_str())
            .json(resume)
            .send()
            .await?;
        let record = read_envelope::<CreatedRecord>(response).await?;
        debug!(id = ?record.as_ref().and_then(|r| r.id), "create acknowledged");
        Ok(record.unwrap_or_default())
    }

    async fn update(&self, token: &AuthToken, id: i64, resume: &Resume) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.url(&format!("/api/resumes/{id}")))
            .bearer_auth(token.as_str())
            .json(resume)
            .send()
            .await?;
        read_envelope::<serde_json::Value>(response).await?;
        debug!(id, "update acknowledged");
        Ok(())
    }

    async fn read(&self, token: &AuthToken, id: i64) -> Result<Resume, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/api/resumes/{id}")))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        read_envelope::<Resume>(response)
            .await?
            .ok_or_else(|| RemoteError::Rejected(format!("resume {id} came back empty")))
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>, RemoteError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    parse_envelope(status, &body)
}

/// Unwraps the API envelope. Non-2xx statuses and `success: false` are errors;
/// the server's `message`/`error` text is carried through when present.
fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>, RemoteError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));
        return Err(RemoteError::Api { status, message });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.success {
        return Err(RemoteError::Rejected(
            envelope
                .message
                .or(envelope.error)
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    Ok(envelope.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_created_record() {
        let body = r#"{"success": true, "data": {"id": 42, "title": "x"}}"#;
        let record = parse_envelope::<CreatedRecord>(201, body).unwrap().unwrap();
        assert_eq!(record.id, Some(42));
    }

    #[test]
    fn test_created_record_without_id() {
        let body = r#"{"success": true, "data": {"title": "x"}}"#;
        let record = parse_envelope::<CreatedRecord>(200, body).unwrap().unwrap();
        assert_eq!(record.id, None);

        let body = r#"{"success": true}"#;
        assert!(parse_envelope::<CreatedRecord>(200, body).unwrap().is_none());
    }

    #[test]
    fn test_error_status_uses_server_message() {
        let body = r#"{"success": false, "message": "Resume not found"}"#;
        let err = parse_envelope::<CreatedRecord>(404, body).unwrap_err();
        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Resume not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_error_status_with_unparseable_body() {
        let err = parse_envelope::<CreatedRecord>(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 502, .. }));
    }

    #[test]
    fn test_unsuccessful_envelope_is_rejected() {
        let body = r#"{"success": false, "error": "validation failed"}"#;
        let err = parse_envelope::<serde_json::Value>(200, body).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(msg) if msg == "validation failed"));
    }

    #[test]
    fn test_malformed_success_body_is_parse_error() {
        let err = parse_envelope::<CreatedRecord>(200, "not json").unwrap_err();
        assert!(matches!(err, RemoteError::Parse(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = HttpRemoteStore::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("/api/resumes/"), "http://localhost:8000/api/resumes/");
    }
}
