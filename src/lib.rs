//! liveui - a streaming session engine for generated-markup chat
//!
//! The library consumes a server-sent incremental response stream,
//! reconstructs a conversation transcript and a versioned rendering
//! artifact, and keeps registered render surfaces synchronized with
//! that artifact. Modules are public for use in integration tests.

pub mod adapters;
pub mod artifact;
pub mod client;
pub mod models;
pub mod session;
pub mod sse;
pub mod surface;
pub mod traits;
pub mod transcript;
