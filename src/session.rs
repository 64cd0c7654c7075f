//! Session controller: the state machine driving one conversation.
//!
//! The controller owns the transcript, the artifact store and the render
//! surface manager, and serializes all mutation of them by running at
//! most one exchange at a time. An exchange is one user message plus the
//! streamed assistant response reconstructed from decoded events.

use futures_util::StreamExt;
use thiserror::Error;

use crate::artifact::ArtifactStore;
use crate::client::{ChatClient, ClientError};
use crate::models::{ChatRequest, Message};
use crate::sse::StreamEvent;
use crate::surface::RenderSurfaceManager;
use crate::transcript::TranscriptStore;

/// Session lifecycle states.
///
/// `Erred` is transient: a failed exchange passes through it and settles
/// back on `Idle`, so the session stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No exchange in flight
    Idle,
    /// Request sent, no event decoded yet
    Sending,
    /// At least one event decoded, completion pending
    Streaming,
    /// The current exchange failed
    Erred,
}

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A send was attempted while another exchange is active
    #[error("an exchange is already in flight")]
    ExchangeInFlight,
    /// The exchange could not be opened or was interrupted
    #[error(transparent)]
    Transport(#[from] ClientError),
    /// The stream ended before a completion event arrived
    #[error("stream ended before completion")]
    Incomplete,
}

/// Drives exchanges against the backend and applies their effects.
///
/// All stores are mutated on the caller's task, in event arrival order;
/// the phase guard in [`send`](Self::send) keeps exchanges from
/// overlapping.
pub struct SessionController {
    client: ChatClient,
    transcript: TranscriptStore,
    artifact: ArtifactStore,
    surfaces: RenderSurfaceManager,
    conversation_id: Option<String>,
    phase: SessionPhase,
}

impl SessionController {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            transcript: TranscriptStore::new(),
            artifact: ArtifactStore::new(),
            surfaces: RenderSurfaceManager::new(),
            conversation_id: None,
            phase: SessionPhase::Idle,
        }
    }

    /// Replace the default surface manager, e.g. to enable spooling.
    pub fn with_surface_manager(mut self, surfaces: RenderSurfaceManager) -> Self {
        self.surfaces = surfaces;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn artifact(&self) -> &ArtifactStore {
        &self.artifact
    }

    pub fn surfaces(&self) -> &RenderSurfaceManager {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut RenderSurfaceManager {
        &mut self.surfaces
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Send a user message and stream the assistant response to completion.
    ///
    /// Rejected with [`SessionError::ExchangeInFlight`] unless the session
    /// is idle. On failure the transcript gains an error-notice message,
    /// the placeholder keeps whatever partial content it had, and the
    /// session returns to idle.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let (placeholder_id, request) = self.begin_exchange(text.into())?;

        let mut events = match self.client.stream(&request).await {
            Ok(events) => events,
            Err(err) => return Err(self.fail_exchange(err.into())),
        };

        let mut completed = false;
        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::MalformedLine { .. }) => {
                    // Expected noise in an incremental protocol; logged by
                    // the decoder, no session effect.
                }
                Ok(event) => {
                    if self.phase == SessionPhase::Sending {
                        self.phase = SessionPhase::Streaming;
                    }
                    if self.apply_event(&placeholder_id, event).await {
                        completed = true;
                        break;
                    }
                }
                Err(err) => return Err(self.fail_exchange(err.into())),
            }
        }

        if !completed {
            return Err(self.fail_exchange(SessionError::Incomplete));
        }

        self.phase = SessionPhase::Idle;
        tracing::info!(
            conversation = self.conversation_id.as_deref().unwrap_or("-"),
            "exchange complete"
        );
        Ok(())
    }

    /// Send a user message over the buffered endpoint.
    ///
    /// Applies the same effects as a streamed exchange that emitted only
    /// its completion event.
    pub async fn send_buffered(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let (placeholder_id, request) = self.begin_exchange(text.into())?;

        let response = match self.client.send_buffered(&request).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail_exchange(err.into())),
        };

        self.phase = SessionPhase::Streaming;
        self.apply_event(
            &placeholder_id,
            StreamEvent::Complete {
                final_text: response.response,
                conversation_id: response.conversation_id,
                is_artifact: response.is_ui,
                payload: response.html_content,
            },
        )
        .await;

        self.phase = SessionPhase::Idle;
        Ok(())
    }

    /// Replace the session with a conversation fetched from the server.
    pub async fn load_conversation(&mut self, id: &str) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::ExchangeInFlight);
        }

        let payload = self.client.fetch_conversation(id).await?;

        self.transcript = TranscriptStore::from_messages(payload.history);
        self.conversation_id = Some(payload.conversation_id);
        // Server history carries text only; any artifact belongs to the
        // previous conversation and is no longer current.
        self.artifact.clear();

        tracing::info!(conversation = id, messages = self.transcript.len(), "loaded conversation");
        Ok(())
    }

    /// Start over: clears the transcript, artifact and conversation id.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::ExchangeInFlight);
        }
        self.transcript.clear();
        self.artifact.clear();
        self.conversation_id = None;
        Ok(())
    }

    /// Guard, transcript setup and request assembly shared by both send paths.
    fn begin_exchange(&mut self, text: String) -> Result<(String, ChatRequest), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::ExchangeInFlight);
        }

        // The server expects history exclusive of the new exchange.
        let history = self.transcript.history();

        let user = Message::user(text.clone());
        let placeholder = Message::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.transcript.append(user);
        self.transcript.append(placeholder);

        let mut request = ChatRequest::new(text).with_history(history);
        if let Some(id) = &self.conversation_id {
            request = request.with_conversation(id.clone());
        }

        self.phase = SessionPhase::Sending;
        Ok((placeholder_id, request))
    }

    /// Apply one decoded event. Returns `true` for the completion event.
    async fn apply_event(&mut self, placeholder_id: &str, event: StreamEvent) -> bool {
        match event {
            StreamEvent::TextChunk {
                accumulated_text,
                conversation_id,
            } => {
                self.transcript.update_by_id(placeholder_id, |m| {
                    m.content = accumulated_text;
                });
                self.adopt_conversation(conversation_id);
                false
            }
            StreamEvent::ArtifactChunk { payload } | StreamEvent::ArtifactComplete { payload } => {
                self.store_artifact(payload, placeholder_id).await;
                false
            }
            StreamEvent::Complete {
                final_text,
                conversation_id,
                is_artifact,
                payload,
            } => {
                self.transcript.update_by_id(placeholder_id, |m| {
                    m.content = final_text;
                    m.is_artifact = is_artifact;
                });
                if let Some(payload) = payload {
                    self.store_artifact(payload, placeholder_id).await;
                }
                self.adopt_conversation(conversation_id);
                true
            }
            StreamEvent::MalformedLine { .. } => false,
        }
    }

    /// Store an artifact payload and push it to every registered surface.
    async fn store_artifact(&mut self, payload: String, placeholder_id: &str) {
        let artifact = self.artifact.set(payload).clone();
        self.transcript.update_by_id(placeholder_id, |m| {
            m.is_artifact = true;
        });
        self.surfaces.on_artifact_updated(&artifact).await;
    }

    fn adopt_conversation(&mut self, id: String) {
        if self.conversation_id.is_none() && !id.is_empty() {
            tracing::debug!(conversation = %id, "conversation id assigned by server");
            self.conversation_id = Some(id);
        }
    }

    /// Record the failure in the transcript and settle back on idle.
    fn fail_exchange(&mut self, err: SessionError) -> SessionError {
        tracing::warn!(error = %err, "exchange failed");
        self.phase = SessionPhase::Erred;
        self.transcript.append(Message::assistant(format!(
            "Sorry, something went wrong with this exchange: {}. Please try again.",
            err
        )));
        self.phase = SessionPhase::Idle;
        err
    }
}
