use super::types::{ConversationKey, TTL_ABSENT};
use super::ConversationStore;
use crate::config::StoreConfig;
use crate::error::{MemoryError, Result};
use crate::message::Message;
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::ops::Range;
use std::time::Duration;

/// Conversation store backed by one redis list per conversation
///
/// Each list element is one JSON-encoded [`Message`]. The list key carries
/// the TTL; every append and every successful read resets it.
#[derive(Clone)]
pub struct RedisConversationStore {
    conn: ConnectionManager,
    keys: ConversationKey,
    ttl_seconds: i64,
    scan_count: usize,
}

impl std::fmt::Debug for RedisConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConversationStore")
            .field("keys", &self.keys)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("scan_count", &self.scan_count)
            .finish_non_exhaustive()
    }
}

impl RedisConversationStore {
    /// Connect to the configured redis server
    ///
    /// The server is probed with PING under `connect_timeout_ms` before the
    /// reconnecting connection manager is built, so an unreachable server
    /// fails here rather than on first use.
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::StoreUnavailable` if the URL is invalid or the
    /// server does not answer in time
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis.url.as_str())
            .map_err(|e| MemoryError::StoreUnavailable(format!("Invalid redis URL: {}", e)))?;

        let timeout = Duration::from_millis(config.redis.connect_timeout_ms);
        let probe = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            ConnectionManager::new(client.clone()).await
        };

        let conn = match tokio::time::timeout(timeout, probe).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(MemoryError::from(e).into()),
            Err(_) => {
                return Err(MemoryError::StoreUnavailable(format!(
                    "Timed out after {}ms connecting to redis",
                    config.redis.connect_timeout_ms
                ))
                .into())
            }
        };

        tracing::info!(
            key_prefix = %config.key_prefix,
            ttl_seconds = config.ttl_seconds,
            "Connected to redis conversation store"
        );

        Ok(Self {
            conn,
            keys: ConversationKey::new(config.key_prefix.clone()),
            ttl_seconds: i64::try_from(config.ttl_seconds).unwrap_or(i64::MAX),
            scan_count: config.redis.scan_count,
        })
    }

    fn decode_all(conversation_id: &str, raw: Vec<String>) -> Vec<Message> {
        raw.iter()
            .filter_map(|item| match Message::decode(item) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(conversation_id, "Skipping undecodable message: {}", e);
                    None
                }
            })
            .collect()
    }

    /// LRANGE over inclusive redis indices, then reset the TTL
    async fn try_range(&self, conversation_id: &str, start: isize, stop: isize) -> Result<Vec<Message>> {
        let key = self.keys.key(conversation_id);
        let mut conn = self.conn.clone();
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(MemoryError::from)?;
        if !raw.is_empty() {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.ttl_seconds)
                .query_async(&mut conn)
                .await
                .map_err(MemoryError::from)?;
        }
        Ok(Self::decode_all(conversation_id, raw))
    }

    async fn try_append(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        let key = self.keys.key(conversation_id);
        let mut conn = self.conn.clone();

        if messages.is_empty() {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.ttl_seconds)
                .query_async(&mut conn)
                .await
                .map_err(MemoryError::from)?;
            return Ok(());
        }

        let encoded = messages
            .iter()
            .map(Message::encode)
            .collect::<serde_json::Result<Vec<String>>>()
            .map_err(encode_failure)?;

        let _: () = redis::pipe()
            .atomic()
            .cmd("RPUSH")
            .arg(&key)
            .arg(&encoded)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(MemoryError::from)?;
        Ok(())
    }

    async fn try_int(&self, command: &str, conversation_id: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd(command)
            .arg(self.keys.key(conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(MemoryError::from)?;
        Ok(value)
    }

    async fn try_refresh(&self, conversation_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(self.keys.key(conversation_id))
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(MemoryError::from)?;
        Ok(applied == 1)
    }

    async fn try_scan(&self, id_prefix: &str) -> Result<Vec<String>> {
        let pattern = self.keys.scan_pattern(id_prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut ids = Vec::new();
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(MemoryError::from)?;
            ids.extend(
                keys.iter()
                    .filter_map(|key| self.keys.conversation_id(key))
                    .map(str::to_string),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

/// A message that cannot be encoded fails the write like a lost connection
fn encode_failure(err: serde_json::Error) -> MemoryError {
    MemoryError::StoreUnavailable(format!("Failed to encode messages: {}", err))
}

/// Log a failed read and fall back to `default`
pub(crate) fn degrade<T>(conversation_id: &str, operation: &str, result: Result<T>, default: T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(conversation_id, operation, "Read degraded: {:#}", e);
        default
    })
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn append(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        match self.try_append(conversation_id, messages).await {
            Ok(()) => {
                tracing::debug!(conversation_id, appended = messages.len(), "Appended messages");
                Ok(())
            }
            Err(e) => {
                tracing::error!(conversation_id, "Failed to append messages: {:#}", e);
                Err(e).with_context(|| format!("Failed to append to conversation {}", conversation_id))
            }
        }
    }

    async fn read_all(&self, conversation_id: &str) -> Vec<Message> {
        let result = self.try_range(conversation_id, 0, -1).await;
        let messages = degrade(conversation_id, "read_all", result, Vec::new());
        tracing::debug!(conversation_id, count = messages.len(), "Read all messages");
        messages
    }

    async fn read_last_n(&self, conversation_id: &str, n: usize) -> Vec<Message> {
        let start = match isize::try_from(n) {
            Ok(n) if n > 0 => -n,
            _ => 0,
        };
        let result = self.try_range(conversation_id, start, -1).await;
        degrade(conversation_id, "read_last_n", result, Vec::new())
    }

    async fn read_range(&self, conversation_id: &str, range: Range<usize>) -> Vec<Message> {
        if range.start >= range.end {
            return Vec::new();
        }
        let start = isize::try_from(range.start).unwrap_or(isize::MAX);
        let stop = isize::try_from(range.end - 1).unwrap_or(isize::MAX);
        let result = self.try_range(conversation_id, start, stop).await;
        degrade(conversation_id, "read_range", result, Vec::new())
    }

    async fn clear(&self, conversation_id: &str) -> Result<()> {
        match self.try_int("DEL", conversation_id).await {
            Ok(removed) => {
                tracing::info!(conversation_id, removed = removed > 0, "Cleared conversation");
                Ok(())
            }
            Err(e) => {
                tracing::error!(conversation_id, "Failed to clear conversation: {:#}", e);
                Err(e)
            }
        }
    }

    async fn exists(&self, conversation_id: &str) -> bool {
        let result = self.try_int("EXISTS", conversation_id).await;
        degrade(conversation_id, "exists", result, 0) > 0
    }

    async fn remaining_ttl(&self, conversation_id: &str) -> i64 {
        let result = self.try_int("TTL", conversation_id).await;
        degrade(conversation_id, "remaining_ttl", result, TTL_ABSENT)
    }

    async fn refresh_ttl(&self, conversation_id: &str) -> bool {
        let result = self.try_refresh(conversation_id).await;
        degrade(conversation_id, "refresh_ttl", result, false)
    }

    async fn count(&self, conversation_id: &str) -> usize {
        let result = self.try_int("LLEN", conversation_id).await;
        usize::try_from(degrade(conversation_id, "count", result, 0)).unwrap_or(0)
    }

    async fn conversation_ids(&self, id_prefix: &str) -> Vec<String> {
        let result = self.try_scan(id_prefix).await;
        let ids = degrade(id_prefix, "conversation_ids", result, Vec::new());
        tracing::debug!(count = ids.len(), "Found conversation ids");
        ids
    }
}
