//! HTTP client for the chat backend.
//!
//! This module provides the client for interacting with the chat API,
//! including streaming responses via Server-Sent Events (SSE). The HTTP
//! transport is injected through the [`HttpClient`] trait so tests can
//! drive the client with scripted responses.

use crate::models::{ChatRequest, ChatResponse, ConversationPayload, HealthStatus};
use crate::sse::{StreamDecoder, StreamEvent};
use crate::traits::{ByteStream, HttpClient, HttpError};
use futures_util::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Default URL for the chat backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Error type for chat client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    /// JSON deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Server returned an error status
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    /// Requested conversation does not exist on the server
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}

/// A stream of decoded events from one generation exchange.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Client for the chat backend API.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl ChatClient {
    /// Create a new client for the given base URL.
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Create a client pointed at the default local backend.
    pub fn with_default_url(http: Arc<dyn HttpClient>) -> Self {
        Self::new(http, DEFAULT_BASE_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a message and stream the incremental response.
    ///
    /// Returns a stream of [`StreamEvent`]s decoded from the SSE body. The
    /// stream ends after the completion record arrives, or yields a single
    /// `Err` and stops if the transport fails mid-generation.
    pub async fn stream(&self, request: &ChatRequest) -> Result<EventStream, ClientError> {
        let url = format!("{}/api/chat/stream", self.base_url);
        let body = serde_json::to_string(request)?;

        tracing::debug!(url = %url, "opening streaming exchange");

        let byte_stream = self.http.post_json_stream(&url, &body).await?;

        Ok(Self::decode_stream(byte_stream))
    }

    /// Drive a [`StreamDecoder`] over a raw byte stream, yielding domain events.
    fn decode_stream(byte_stream: ByteStream) -> EventStream {
        let event_stream = stream::unfold(
            (byte_stream, StreamDecoder::new(), false),
            |(mut byte_stream, mut decoder, eof)| async move {
                loop {
                    // Drain decoded events before pulling more bytes.
                    if let Some(event) = decoder.next_event() {
                        return Some((Ok(event), (byte_stream, decoder, eof)));
                    }
                    if decoder.is_finished() || eof {
                        return None;
                    }

                    match byte_stream.next().await {
                        Some(Ok(chunk)) => {
                            decoder.feed(&chunk);
                        }
                        Some(Err(e)) => {
                            return Some((
                                Err(ClientError::Http(e)),
                                (byte_stream, decoder, true),
                            ));
                        }
                        None => {
                            // Stream ended: flush any unterminated trailing line.
                            if let Some(event) = decoder.finish() {
                                return Some((Ok(event), (byte_stream, decoder, true)));
                            }
                            return None;
                        }
                    }
                }
            },
        );

        Box::pin(event_stream)
    }

    /// Send a message and wait for the fully buffered response.
    pub async fn send_buffered(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::to_string(request)?;

        let response = self.http.post_json(&url, &body).await?;
        if !response.is_success() {
            return Err(ClientError::ServerError {
                status: response.status,
                message: response.text(),
            });
        }

        Ok(response.json()?)
    }

    /// Fetch the stored history for a conversation.
    pub async fn fetch_conversation(&self, id: &str) -> Result<ConversationPayload, ClientError> {
        let url = format!("{}/api/conversations/{}", self.base_url, id);

        let response = self.http.get(&url).await?;
        if response.status == 404 {
            return Err(ClientError::ConversationNotFound(id.to_string()));
        }
        if !response.is_success() {
            return Err(ClientError::ServerError {
                status: response.status,
                message: response.text(),
            });
        }

        Ok(response.json()?)
    }

    /// Delete a conversation from the server. Idempotent.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/conversations/{}", self.base_url, id);

        let response = self.http.delete(&url).await?;
        if !response.is_success() {
            return Err(ClientError::ServerError {
                status: response.status,
                message: response.text(),
            });
        }

        Ok(())
    }

    /// Check whether the backend is up and which model it is serving.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = format!("{}/api/health", self.base_url);

        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(ClientError::ServerError {
                status: response.status,
                message: response.text(),
            });
        }

        Ok(response.json()?)
    }
}
