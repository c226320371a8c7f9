//! Conversation storage
//!
//! A conversation is one store entry holding an ordered list of serialized
//! messages, addressed by `key_prefix + conversation_id`, with a time-to-live
//! attached to that same entry. Every successful read or write resets the
//! TTL to the configured window (sliding expiration).
//!
//! Read operations degrade to their "not found" value when the backend
//! fails; write operations (`append`, `clear`) report
//! [`MemoryError::StoreUnavailable`].
//!
//! Two implementations exist behind the [`ConversationStore`] trait and one
//! is chosen by [`connect`] at construction time.

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{MemoryError, Result};
use crate::message::Message;
use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;

pub mod memory;
pub mod redis_store;
pub mod types;

pub use memory::InMemoryConversationStore;
pub use redis_store::RedisConversationStore;
pub use types::{ConversationKey, TTL_ABSENT, TTL_PERSISTENT};

/// Durable, expiring, append-only message lists keyed by conversation id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append messages in order and reset the TTL
    ///
    /// Appending an empty slice stores nothing; it only refreshes the TTL of
    /// an existing conversation.
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::StoreUnavailable` if the write fails, including
    /// when a message cannot be encoded
    async fn append(&self, conversation_id: &str, messages: &[Message]) -> Result<()>;

    /// Full sequence, oldest first; refreshes the TTL
    async fn read_all(&self, conversation_id: &str) -> Vec<Message>;

    /// The most recent `n` messages, oldest first within the window
    ///
    /// `n == 0` or `n >= count` behaves as [`read_all`](Self::read_all).
    async fn read_last_n(&self, conversation_id: &str, n: usize) -> Vec<Message>;

    /// Messages at the forward indices `range` (clamped to the list), oldest first
    async fn read_range(&self, conversation_id: &str, range: Range<usize>) -> Vec<Message>;

    /// Delete the conversation and its TTL; clearing an absent id is not an error
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::StoreUnavailable` if the delete fails
    async fn clear(&self, conversation_id: &str) -> Result<()>;

    /// True iff the store key is present
    async fn exists(&self, conversation_id: &str) -> bool;

    /// Seconds until expiry, [`TTL_ABSENT`] if the key is missing
    async fn remaining_ttl(&self, conversation_id: &str) -> i64;

    /// Reset the expiration window; returns false when the key is absent
    async fn refresh_ttl(&self, conversation_id: &str) -> bool;

    /// Number of stored messages, 0 if absent
    async fn count(&self, conversation_id: &str) -> usize;

    /// Ids of live conversations whose id starts with `id_prefix`, sorted
    async fn conversation_ids(&self, id_prefix: &str) -> Vec<String>;
}

/// Build the configured store
///
/// When the redis backend cannot be reached and `fallback_to_memory` is set,
/// an in-memory store with the same prefix and TTL is returned instead.
///
/// # Errors
///
/// Returns `MemoryError::StoreUnavailable` when redis is unreachable and the
/// fallback is disabled
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!(
                key_prefix = %config.key_prefix,
                ttl_seconds = config.ttl_seconds,
                "Using in-memory conversation store (contents are not persisted)"
            );
            Ok(Arc::new(InMemoryConversationStore::new(
                &config.key_prefix,
                config.ttl(),
            )))
        }
        StoreBackend::Redis => match RedisConversationStore::connect(config).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) if config.fallback_to_memory => {
                tracing::warn!(
                    "Redis unavailable ({}), falling back to in-memory conversation store",
                    e
                );
                Ok(Arc::new(InMemoryConversationStore::new(
                    &config.key_prefix,
                    config.ttl(),
                )))
            }
            Err(e) => Err(MemoryError::StoreUnavailable(format!(
                "Failed to connect to redis at {}: {}",
                config.redis.url, e
            ))
            .into()),
        },
    }
}
