//! Production HTTP transport on reqwest.
//!
//! One shared `reqwest::Client` underneath, so connections are reused
//! across requests. The adapter owns the wire details the trait leaves
//! open: JSON content type on posts and the SSE accept header on the
//! streaming endpoint.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::traits::{ByteStream, HttpClient, HttpError, Response};

/// HTTP client backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client, for custom timeouts or TLS
    /// settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn convert_error(err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_connect() {
            HttpError::ConnectionFailed(err.to_string())
        } else {
            HttpError::Other(err.to_string())
        }
    }

    async fn collect(request: reqwest::RequestBuilder) -> Result<Response, HttpError> {
        let response = request.send().await.map_err(Self::convert_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Self::convert_error)?;
        Ok(Response::new(status, body))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Response, HttpError> {
        Self::collect(self.client.get(url)).await
    }

    async fn post_json(&self, url: &str, body: &str) -> Result<Response, HttpError> {
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        Self::collect(request).await
    }

    async fn delete(&self, url: &str) -> Result<Response, HttpError> {
        Self::collect(self.client.delete(url)).await
    }

    async fn post_json_stream(&self, url: &str, body: &str) -> Result<ByteStream, HttpError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body.to_string())
            .send()
            .await
            .map_err(Self::convert_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HttpError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|err| {
                if err.is_timeout() {
                    HttpError::Timeout(err.to_string())
                } else {
                    HttpError::StreamInterrupted(err.to_string())
                }
            })
        });

        Ok(Box::pin(stream))
    }
}
