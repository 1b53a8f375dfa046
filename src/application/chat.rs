//! Chat service - one conversation turn, blocking or streamed.
//!
//! The service owns the turn pipeline: validate the message, resolve the
//! session, compose the persona prompt, obtain a completion, and persist the
//! finished turn. On the streaming path the reply is re-chunked and pushed
//! through a bounded channel; the transport layer owns the receiving end, so
//! a disconnected client closes the channel and stops the producer.
//!
//! Quota exhaustion on the streaming path is recovered in place: the request
//! is served the canned apology and still ends with a completion event.
//! Every other provider failure surfaces as an error event (streaming) or an
//! error result (blocking).

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::application::prompt::{self, QUOTA_ANALYSIS_NOTE};
use crate::application::typing::{self, LiveRechunker, TypingConfig};
use crate::domain::{SessionId, Turn};
use crate::ports::{CompletionClient, CompletionError, CompletionRequest, SessionStore, StoreError};

/// Buffered stream events between producer and transport.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// How a reply is generated and chunked.
///
/// Decided once at startup: live requests stream from the provider and are
/// re-flushed in large pieces; mock mode takes the canned reply and plays it
/// through the typing simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Live,
    Mock,
}

/// Chat pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Message was empty after trimming. No session is touched.
    #[error("メッセージが空です")]
    EmptyMessage,

    /// Session vanished between resolution and persistence.
    #[error("セッションが見つかりません")]
    SessionNotFound,

    /// Provider failure on the blocking path.
    #[error("{0}")]
    Completion(#[from] CompletionError),
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ChatError::SessionNotFound,
        }
    }
}

/// Result of one blocking chat turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub session_id: SessionId,
    pub structured_analysis: String,
    pub timestamp: DateTime<Utc>,
}

/// Server-push events for one streaming turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Incremental reply text.
    Content { content: String },
    /// Turn persisted; terminal on success.
    Complete {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    /// Unrecoverable failure; terminal, no completion follows.
    Error { message: String },
}

/// Outcome of the generation phase of a streaming turn.
enum TurnOutcome {
    /// Full reply delivered; ready to persist.
    Delivered { reply: String, analysis: String },
    /// Client went away mid-stream; nothing is persisted.
    Disconnected,
    /// Provider failed; an error event ends the stream.
    Failed(String),
}

/// One-turn chat pipeline over injected store and completion client.
pub struct ChatService {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn CompletionClient>,
    mode: ResponseMode,
    typing: TypingConfig,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: Arc<dyn CompletionClient>,
        mode: ResponseMode,
    ) -> Self {
        Self {
            store,
            client,
            mode,
            typing: TypingConfig::natural(),
        }
    }

    /// Overrides the typing pacing (tests use [`TypingConfig::instant`]).
    pub fn with_typing(mut self, typing: TypingConfig) -> Self {
        self.typing = typing;
        self
    }

    /// Handles one blocking chat turn.
    ///
    /// Mode is fixed at startup here: mock mode answers from the canned
    /// reply, live mode surfaces any provider failure to the caller.
    pub async fn chat(
        &self,
        message: &str,
        session_token: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (session_id, session) = self.store.resolve(session_token).await;
        let system_prompt = prompt::compose_system_prompt(&prompt::render_history(&session.messages));

        let reply = self
            .client
            .complete(CompletionRequest::new(system_prompt, message))
            .await?;

        let turn = Turn::new(message, reply.as_str());
        let timestamp = turn.timestamp;
        self.store.append_turn(&session_id, turn).await?;

        Ok(ChatReply {
            response: reply,
            session_id,
            structured_analysis: String::new(),
            timestamp,
        })
    }

    /// Starts one streaming chat turn.
    ///
    /// Validation and session resolution happen before this returns, so the
    /// caller can still answer with a plain client error. The returned
    /// receiver yields `Content` events followed by exactly one terminal
    /// `Complete` or `Error`; dropping it cancels the producer.
    pub async fn chat_stream(
        &self,
        message: &str,
        session_token: Option<&str>,
        image_urls: Vec<String>,
    ) -> Result<mpsc::Receiver<StreamEvent>, ChatError> {
        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let (session_id, session) = self.store.resolve(session_token).await;
        let system_prompt = prompt::compose_system_prompt(&prompt::render_history(&session.messages));

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let mode = self.mode;
        let typing = self.typing.clone();

        tokio::spawn(async move {
            run_stream_turn(
                store, client, mode, typing, session_id, system_prompt, message, image_urls, tx,
            )
            .await;
        });

        Ok(rx)
    }
}

/// Producer side of one streaming turn.
#[allow(clippy::too_many_arguments)]
async fn run_stream_turn(
    store: Arc<dyn SessionStore>,
    client: Arc<dyn CompletionClient>,
    mode: ResponseMode,
    typing: TypingConfig,
    session_id: SessionId,
    system_prompt: String,
    message: String,
    image_urls: Vec<String>,
    tx: mpsc::Sender<StreamEvent>,
) {
    tracing::debug!(session_id = %session_id, ?mode, "streaming turn started");

    let outcome = match mode {
        ResponseMode::Mock => stream_canned(&client, &typing, &system_prompt, &message, &tx).await,
        ResponseMode::Live => {
            stream_live(&client, &typing, &system_prompt, &message, image_urls, &tx).await
        }
    };

    match outcome {
        TurnOutcome::Delivered { reply, analysis } => {
            let turn = Turn::with_analysis(message, reply, analysis);
            let timestamp = turn.timestamp;
            match store.append_turn(&session_id, turn).await {
                Ok(()) => {
                    let _ = tx
                        .send(StreamEvent::Complete {
                            session_id,
                            timestamp,
                        })
                        .await;
                }
                Err(err) => {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: format!("エラーが発生しました: {}", err),
                        })
                        .await;
                }
            }
        }
        TurnOutcome::Disconnected => {
            tracing::debug!(session_id = %session_id, "client disconnected mid-stream");
        }
        TurnOutcome::Failed(message) => {
            let _ = tx
                .send(StreamEvent::Error {
                    message: format!("エラーが発生しました: {}", message),
                })
                .await;
        }
    }
}

/// Mock path: canned reply played through the typing simulation.
async fn stream_canned(
    client: &Arc<dyn CompletionClient>,
    typing: &TypingConfig,
    system_prompt: &str,
    message: &str,
    tx: &mpsc::Sender<StreamEvent>,
) -> TurnOutcome {
    let reply = match client
        .complete(CompletionRequest::new(system_prompt, message))
        .await
    {
        Ok(reply) => reply,
        Err(err) => return TurnOutcome::Failed(err.to_string()),
    };

    // The rng must not be held across an await point.
    let plan = {
        let mut rng = rand::thread_rng();
        typing::plan_typing_chunks(&reply, typing, &mut rng)
    };

    for chunk in plan {
        if !chunk.pre_pause.is_zero() {
            sleep(chunk.pre_pause).await;
        }
        if send_content(tx, chunk.text).await.is_err() {
            return TurnOutcome::Disconnected;
        }
        if !chunk.post_pause.is_zero() {
            sleep(chunk.post_pause).await;
        }
    }

    TurnOutcome::Delivered {
        reply,
        analysis: String::new(),
    }
}

/// Live path: provider fragments re-flushed in larger chunks.
async fn stream_live(
    client: &Arc<dyn CompletionClient>,
    typing: &TypingConfig,
    system_prompt: &str,
    message: &str,
    image_urls: Vec<String>,
    tx: &mpsc::Sender<StreamEvent>,
) -> TurnOutcome {
    let request = CompletionRequest::new(system_prompt, message).with_images(image_urls);

    let mut fragments = match client.stream_complete(request).await {
        Ok(fragments) => fragments,
        Err(CompletionError::QuotaExceeded) => {
            return stream_quota_fallback(typing, message, tx).await;
        }
        Err(err) => return TurnOutcome::Failed(err.to_string()),
    };

    let mut rechunker = LiveRechunker::new(typing);
    let mut reply = String::new();

    while let Some(item) = fragments.next().await {
        match item {
            Ok(fragment) => {
                for chunk in rechunker.push(&fragment) {
                    reply.push_str(&chunk);
                    if send_content(tx, chunk).await.is_err() {
                        return TurnOutcome::Disconnected;
                    }
                    sleep(typing.live_flush_delay).await;
                }
            }
            Err(CompletionError::QuotaExceeded) => {
                // The partial reply already shown is superseded by the
                // persisted fallback turn.
                return stream_quota_fallback(typing, message, tx).await;
            }
            Err(err) => return TurnOutcome::Failed(err.to_string()),
        }
    }

    if let Some(rest) = rechunker.finish() {
        reply.push_str(&rest);
        if send_content(tx, rest).await.is_err() {
            return TurnOutcome::Disconnected;
        }
    }

    TurnOutcome::Delivered {
        reply,
        analysis: String::new(),
    }
}

/// Serves the canned apology when the provider reports quota exhaustion.
///
/// Recovered in place for this request only; global mode is untouched.
async fn stream_quota_fallback(
    typing: &TypingConfig,
    message: &str,
    tx: &mpsc::Sender<StreamEvent>,
) -> TurnOutcome {
    tracing::warn!("provider quota exhausted, serving fallback reply");

    let reply = prompt::quota_fallback_reply(message);
    for line in typing::fallback_lines(&reply) {
        if send_content(tx, line).await.is_err() {
            return TurnOutcome::Disconnected;
        }
        sleep(typing.fallback_line_delay).await;
    }

    TurnOutcome::Delivered {
        reply,
        analysis: QUOTA_ANALYSIS_NOTE.to_string(),
    }
}

async fn send_content(
    tx: &mpsc::Sender<StreamEvent>,
    content: String,
) -> Result<(), mpsc::error::SendError<StreamEvent>> {
    tx.send(StreamEvent::Content { content }).await
}
