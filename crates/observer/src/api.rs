//! REST client for the status snapshot endpoints.

use cookbook_core::protocol::StatusSnapshot;
use cookbook_core::refine::RefineSession;
use cookbook_core::session::Session;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ObserverError;

/// `{"data": ...}` envelope used by every job server response.
#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// HTTP client for the job server's snapshot endpoints.
pub struct SnapshotApi {
    client: reqwest::Client,
    api_url: String,
}

impl SnapshotApi {
    /// * `api_url` - versioned base URL, e.g. `http://host:3000/api/v1`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// `GET /bootstrap/status`; `None` when the server is idle.
    pub async fn bootstrap_status(&self) -> Result<Option<Session>, ObserverError> {
        self.status("bootstrap").await
    }

    /// `GET /refine/status`; `None` when the server is idle.
    pub async fn refine_status(&self) -> Result<Option<RefineSession>, ObserverError> {
        self.status("refine").await
    }

    async fn status<T: DeserializeOwned>(&self, job: &str) -> Result<Option<T>, ObserverError> {
        let response = self
            .client
            .get(format!("{}/{job}/status", self.api_url))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        let envelope: DataResponse<StatusSnapshot<T>> = serde_json::from_str(&body)?;
        Ok(envelope.data.into_session())
    }

    /// Turn a non-2xx response into [`ObserverError::Api`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ObserverError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ObserverError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}
