use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::errors::RemoteError;

/// Form field carrying the serialized document.
pub const RESUME_DATA_FIELD: &str = "resume_data";

/// One render request. It has no id and gets no reply; a newer request simply
/// paints over an older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    /// Name of the display surface the render lands in.
    pub target: String,
    /// JSON-serialized document.
    pub resume_data: String,
}

/// A one-way channel to the rendering surface. `dispatch` must not block and
/// must not report delivery.
pub trait PreviewSurface: Send + Sync {
    fn dispatch(&self, request: PreviewRequest);
}

/// POSTs the document as a url-encoded form to the preview endpoint and drops
/// the response.
#[derive(Clone)]
pub struct HttpPreviewSurface {
    client: Client,
    endpoint: String,
}

impl HttpPreviewSurface {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: format!("{}/api/resumes/preview", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PreviewSurface for HttpPreviewSurface {
    fn dispatch(&self, request: PreviewRequest) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime; preview dropped");
            return;
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            let sent = client
                .post(&endpoint)
                .query(&[("target", request.target.as_str())])
                .form(&[(RESUME_DATA_FIELD, request.resume_data.as_str())])
                .send()
                .await;
            match sent {
                Ok(response) => debug!(status = %response.status(), frame = %request.target, "preview delivered"),
                Err(e) => debug!("preview dispatch failed: {e}"),
            }
        });
    }
}
