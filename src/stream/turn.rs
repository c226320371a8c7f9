//! Conversation turn driver
//!
//! A turn loads prior messages, hands the prompt to an external generation
//! source, and forwards that source's fragments to the caller while folding
//! them into a [`StreamAggregator`]. When the stream ends, fails, or is
//! dropped, the user message and the reduced reply are written in one append
//! on a spawned task, so a slow store never stalls fragment delivery.

use super::aggregator::{Finished, StreamAggregator, TurnState};
use super::metrics::TurnMetrics;
use crate::error::{MemoryError, Result};
use crate::message::{Message, Role};
use crate::storage::ConversationStore;
use futures::stream::{BoxStream, Stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Starts turns against one store
#[derive(Clone)]
pub struct ChatTurn {
    store: Arc<dyn ConversationStore>,
    history_limit: Option<usize>,
    system_prompt: Option<String>,
}

impl ChatTurn {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            history_limit: None,
            system_prompt: None,
        }
    }

    /// Load only the most recent `n` messages as context
    pub fn with_history_limit(mut self, n: usize) -> Self {
        self.history_limit = Some(n).filter(|n| *n > 0);
        self
    }

    /// System message placed first in the prompt when the history has none
    ///
    /// The system prompt is never stored.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Load history and prepare the turn for `user_text`
    ///
    /// Loading degrades to an empty history when the store is unavailable.
    pub async fn begin(&self, conversation_id: &str, user_text: impl Into<String>) -> TurnContext {
        let history = match self.history_limit {
            Some(n) => self.store.read_last_n(conversation_id, n).await,
            None => self.store.read_all(conversation_id).await,
        };
        tracing::debug!(
            conversation_id,
            history = history.len(),
            "Loaded conversation history for turn"
        );
        TurnContext {
            store: Arc::clone(&self.store),
            conversation_id: conversation_id.to_string(),
            history,
            user_message: Message::user(user_text),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// A turn whose response has not started streaming yet
pub struct TurnContext {
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
    history: Vec<Message>,
    user_message: Message,
    system_prompt: Option<String>,
}

impl TurnContext {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Prior messages, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn user_message(&self) -> &Message {
        &self.user_message
    }

    /// Messages to send to the generation source
    pub fn prompt(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system_prompt {
            if !self.history.iter().any(|m| m.role == Role::System) {
                messages.push(Message::system(system.clone()));
            }
        }
        messages.extend(self.history.iter().cloned());
        messages.push(self.user_message.clone());
        messages
    }

    /// Attach the generation source's fragment stream
    ///
    /// The returned stream yields the source's items unchanged; a source
    /// error is forwarded as `MemoryError::Generation` and ends the stream.
    /// The handle resolves once the turn has been written.
    pub fn stream(self, fragments: BoxStream<'static, Result<String>>) -> (TurnStream, TurnHandle) {
        let (tx, rx) = oneshot::channel();
        let stream = TurnStream {
            fragments,
            aggregator: StreamAggregator::new(),
            job: Some(PersistJob {
                store: self.store,
                conversation_id: self.conversation_id,
                user_message: self.user_message,
                metrics: TurnMetrics::new(),
                tx,
            }),
        };
        (stream, TurnHandle { rx })
    }
}

/// How a turn ended and what was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub state: TurnState,
    pub final_text: String,
    /// Whether an assistant message was stored; false for an empty reply
    pub persisted: bool,
    /// Generation error or cancellation that ended a failed turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Resolves to the turn's outcome after its single write attempt
#[derive(Debug)]
pub struct TurnHandle {
    rx: oneshot::Receiver<Result<TurnOutcome>>,
}

impl TurnHandle {
    /// Wait for the turn to be written
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::StoreUnavailable` when the write failed or the
    /// persistence task ended without reporting
    pub async fn outcome(self) -> Result<TurnOutcome> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(MemoryError::StoreUnavailable(
                "turn persistence ended without reporting an outcome".to_string(),
            )
            .into()),
        }
    }
}

struct PersistJob {
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
    user_message: Message,
    metrics: TurnMetrics,
    tx: oneshot::Sender<Result<TurnOutcome>>,
}

impl PersistJob {
    fn dispatch(self, finished: Finished, failure: Option<String>) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(self.run(finished, failure));
            }
            Err(_) => {
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    "No async runtime available, turn was not persisted"
                );
                self.metrics.record_finished(finished.state, finished.fragments);
                self.metrics.record_persist_failure();
                let _ = self.tx.send(Err(MemoryError::StoreUnavailable(
                    "no async runtime to persist the turn".to_string(),
                )
                .into()));
            }
        }
    }

    async fn run(self, finished: Finished, failure: Option<String>) {
        let persisted = !finished.text.trim().is_empty();
        let mut messages = vec![self.user_message];
        if persisted {
            messages.push(Message::assistant(finished.text.clone()));
        }

        let result = self.store.append(&self.conversation_id, &messages).await;
        self.metrics
            .record_finished(finished.state, finished.fragments);

        let outcome = match result {
            Ok(()) => {
                tracing::info!(
                    conversation_id = %self.conversation_id,
                    state = %finished.state,
                    saved = messages.len(),
                    "Persisted conversation turn"
                );
                Ok(TurnOutcome {
                    conversation_id: self.conversation_id,
                    state: finished.state,
                    final_text: finished.text,
                    persisted,
                    failure,
                })
            }
            Err(e) => {
                self.metrics.record_persist_failure();
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    state = %finished.state,
                    "Failed to persist conversation turn: {:#}",
                    e
                );
                Err(e)
            }
        };
        // The caller may have stopped waiting
        let _ = self.tx.send(outcome);
    }
}

/// Fragment stream that records the reply as it passes through
pub struct TurnStream {
    fragments: BoxStream<'static, Result<String>>,
    aggregator: StreamAggregator,
    job: Option<PersistJob>,
}

impl TurnStream {
    /// Text reduced from the fragments seen so far
    pub fn text(&self) -> String {
        self.aggregator.text()
    }

    pub fn state(&self) -> TurnState {
        self.aggregator.state()
    }

    fn finish(&mut self, finished: Option<Finished>, failure: Option<String>) {
        if let (Some(finished), Some(job)) = (finished, self.job.take()) {
            job.dispatch(finished, failure);
        }
    }
}

impl Stream for TurnStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.job.is_none() {
            return Poll::Ready(None);
        }

        match this.fragments.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => {
                this.aggregator.push(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                let message = format!("{:#}", e);
                tracing::warn!("Generation stream failed: {}", message);
                let finished = this.aggregator.fail();
                this.finish(finished, Some(message.clone()));
                Poll::Ready(Some(Err(e.context(MemoryError::Generation(message)))))
            }
            Poll::Ready(None) => {
                let finished = this.aggregator.complete();
                this.finish(finished, None);
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        if self.job.is_some() {
            tracing::debug!("Turn dropped before the stream finished, flushing partial reply");
            let finished = self.aggregator.fail();
            self.finish(finished, Some(MemoryError::Cancelled.to_string()));
        }
    }
}
