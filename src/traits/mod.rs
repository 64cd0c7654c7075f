//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, DELETE, streaming)

pub mod http;

pub use http::{ByteStream, HttpClient, HttpError, Response};
