use crate::config::Config;
use crate::error::{MemoryError, Result};
use crate::storage::{self, ConversationStore};
use crate::stream::{ChatTurn, TurnOutcome, TurnState};
use colored::Colorize;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use uuid::Uuid;

/// Record one turn whose reply fragments are read from stdin, one per line
///
/// # Errors
///
/// Returns `MemoryError::Generation` if reading stdin failed part way (the
/// partial reply is still stored), or the store error if the turn could
/// not be written
pub async fn run_record(config: &Config, id: Option<String>, message: String) -> Result<()> {
    let store = storage::connect(&config.store).await?;
    let conversation_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let fragments = line_fragments(BufReader::new(tokio::io::stdin()));

    let outcome = record_turn(store, &conversation_id, message, fragments).await?;

    println!("{}", outcome.final_text);
    println!(
        "{} {} ({})",
        "Conversation".dimmed(),
        outcome.conversation_id.cyan(),
        outcome.state
    );

    match (outcome.state, outcome.failure) {
        (TurnState::Failed, Some(failure)) => Err(MemoryError::Generation(failure).into()),
        _ => Ok(()),
    }
}

/// Drive a full turn over `fragments` and wait for it to be written
pub async fn record_turn(
    store: Arc<dyn ConversationStore>,
    conversation_id: &str,
    message: String,
    fragments: BoxStream<'static, Result<String>>,
) -> Result<TurnOutcome> {
    let turn = ChatTurn::new(store).begin(conversation_id, message).await;
    tracing::info!(
        conversation_id,
        history = turn.history().len(),
        "Recording turn"
    );

    let (mut stream, handle) = turn.stream(fragments);
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => tracing::trace!(len = fragment.len(), "Fragment received"),
            Err(e) => tracing::warn!("Reply stream failed: {:#}", e),
        }
    }
    drop(stream);

    handle.outcome().await
}

/// Each line of `reader` is one fragment
fn line_fragments<R>(reader: R) -> BoxStream<'static, Result<String>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold(reader.lines(), |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), lines)),
            Ok(None) => None,
            Err(e) => Some((Err(MemoryError::Io(e).into()), lines)),
        }
    })
    .boxed()
}
