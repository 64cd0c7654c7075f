//! Scripted HTTP transport for tests.
//!
//! Returns canned responses by URL and records every request so tests
//! can assert on what the engine actually sent.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

use crate::traits::{ByteStream, HttpClient, HttpError, Response};

/// One request as the engine issued it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    /// Request body, for methods that carry one
    pub body: Option<String>,
}

/// What the mock should answer for a URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A buffered response
    Success(Response),
    /// Fail the request outright
    Error(HttpError),
    /// A stream yielding these chunks, then end-of-stream
    Stream(Vec<Bytes>),
    /// A stream yielding these chunks, then the error
    StreamThenError(Vec<Bytes>, HttpError),
    /// Fail to open the stream
    StreamError(HttpError),
}

/// Scripted HTTP client.
///
/// Responses are matched by exact URL first, then by the first scripted
/// URL prefix in insertion order, then the fallback. Scripting the same
/// URL again replaces the earlier entry. Clones share state, so a test
/// can keep one handle for assertions while the code under test owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    scripted: Arc<Mutex<Vec<(String, MockResponse)>>>,
    fallback: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a URL (exact or prefix match).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut scripted = self.scripted.lock().unwrap();
        match scripted.iter_mut().find(|(pattern, _)| pattern == url) {
            Some(entry) => entry.1 = response,
            None => scripted.push((url.to_string(), response)),
        }
    }

    /// Script the response for any URL without a specific match.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record(&self, method: &str, url: &str, body: Option<&str>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            body: body.map(str::to_string),
        });
    }

    fn lookup(&self, url: &str) -> Option<MockResponse> {
        let scripted = self.scripted.lock().unwrap();
        if let Some((_, response)) = scripted.iter().find(|(pattern, _)| pattern == url) {
            return Some(response.clone());
        }
        if let Some((_, response)) = scripted.iter().find(|(pattern, _)| url.starts_with(pattern.as_str())) {
            return Some(response.clone());
        }
        self.fallback.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<Response, HttpError> {
        match self.lookup(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) | Some(MockResponse::StreamError(err)) => Err(err),
            Some(MockResponse::Stream(_)) | Some(MockResponse::StreamThenError(..)) => Err(
                HttpError::Other("stream response scripted for buffered request".to_string()),
            ),
            None => Err(HttpError::Other(format!("no response scripted for {}", url))),
        }
    }

    fn open_stream(&self, url: &str) -> Result<ByteStream, HttpError> {
        match self.lookup(url) {
            Some(MockResponse::Stream(chunks)) => {
                let items: Vec<Result<Bytes, HttpError>> = chunks.into_iter().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(MockResponse::StreamThenError(chunks, err)) => {
                let mut items: Vec<Result<Bytes, HttpError>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(err));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(MockResponse::StreamError(err)) | Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Success(_)) => Err(HttpError::Other(
                "buffered response scripted for stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("no response scripted for {}", url))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.record("GET", url, None);
        self.respond(url)
    }

    async fn post_json(&self, url: &str, body: &str) -> Result<Response, HttpError> {
        self.record("POST", url, Some(body));
        self.respond(url)
    }

    async fn delete(&self, url: &str) -> Result<Response, HttpError> {
        self.record("DELETE", url, None);
        self.respond(url)
    }

    async fn post_json_stream(&self, url: &str, body: &str) -> Result<ByteStream, HttpError> {
        self.record("POST", url, Some(body));
        self.open_stream(url)
    }
}
