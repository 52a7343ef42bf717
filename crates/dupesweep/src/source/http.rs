//! HTTP client for the records API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::error::{Result, SourceError};
use super::{RecordPage, RecordSource};

/// Maximum length for error bodies echoed into error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Truncates an error response body to a loggable length.
fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Records API client backed by reqwest.
///
/// Endpoints follow the records API convention:
/// `POST {base}/collections/{id}/records/query` for pagination and
/// `POST {base}/records/{id}/archive` for archiving. The bearer token is
/// supplied per call and never logged.
pub struct HttpSource {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryPageRequest<'a> {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
}

impl HttpSource {
    /// Creates a client for the records API at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                SourceError::Unreachable(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Converts a non-success response into a `SourceError`.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = sanitize_error_body(&response.text().await.unwrap_or_default());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Unauthorized(body));
        }
        Err(SourceError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn query_page(
        &self,
        credential: &SecretString,
        source_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RecordPage> {
        let url = format!("{}/collections/{}/records/query", self.base_url, source_id);
        debug!("Querying {} (cursor: {:?})", url, cursor);

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose_secret())
            .json(&QueryPageRequest {
                page_size,
                start_cursor: cursor,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;

        let page = response
            .json::<RecordPage>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(page)
    }

    async fn archive_record(
        &self,
        credential: &SecretString,
        record_id: &str,
    ) -> Result<()> {
        let url = format!("{}/records/{}/archive", self.base_url, record_id);
        debug!("Archiving record {}", record_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_short_body_unchanged() {
        assert_eq!(sanitize_error_body("bad request"), "bad request");
    }

    #[test]
    fn test_sanitize_long_body_truncated() {
        let body = "x".repeat(500);
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.len() < body.len());
        assert!(sanitized.ends_with("... (truncated)"));
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = "é".repeat(300);
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.ends_with("... (truncated)"));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let source = HttpSource::new("https://api.example.com/").unwrap();
        assert_eq!(source.base_url, "https://api.example.com");
    }
}
