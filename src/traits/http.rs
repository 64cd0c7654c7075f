//! HTTP transport seam.
//!
//! The engine talks to a single JSON backend: JSON requests out, JSON or
//! an SSE byte stream back. The trait captures exactly those operations
//! and leaves wire details (headers, TLS, timeouts) to the
//! implementation, so tests can drive the engine with a scripted
//! transport instead of a server.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// A boxed stream of response-body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Status and body of a buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text, lossily converted.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Transport-level failures, classified as far as the engine cares.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("http error: {0}")]
    Other(String),
}

/// The HTTP operations the engine performs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Response, HttpError>;

    /// POST a pre-serialized JSON body and buffer the whole response.
    async fn post_json(&self, url: &str, body: &str) -> Result<Response, HttpError>;

    async fn delete(&self, url: &str) -> Result<Response, HttpError>;

    /// POST a pre-serialized JSON body to a streaming (SSE) endpoint and
    /// return the response body as an incremental stream of byte chunks.
    ///
    /// A non-success status is reported as an error here, before any
    /// chunk is yielded.
    async fn post_json_stream(&self, url: &str, body: &str) -> Result<ByteStream, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_covers_2xx_only() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(301, "").is_success());
        assert!(!Response::new(404, "").is_success());
        assert!(!Response::new(500, "").is_success());
    }

    #[test]
    fn test_text_is_lossy() {
        let response = Response::new(200, Bytes::from(vec![b'o', b'k', 0xFF]));
        assert_eq!(response.text(), "ok\u{FFFD}");
    }

    #[test]
    fn test_json_decoding() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Probe {
            status: String,
        }

        let response = Response::new(200, r#"{"status":"healthy"}"#);
        let probe: Probe = response.json().unwrap();
        assert_eq!(probe.status, "healthy");

        let bad = Response::new(200, "not json");
        assert!(bad.json::<Probe>().is_err());
    }

    #[test]
    fn test_error_messages_carry_context() {
        assert_eq!(
            HttpError::Timeout("30s elapsed".to_string()).to_string(),
            "request timed out: 30s elapsed"
        );
        assert_eq!(
            HttpError::ServerError {
                status: 503,
                message: "overloaded".to_string()
            }
            .to_string(),
            "server error (503): overloaded"
        );
    }
}
