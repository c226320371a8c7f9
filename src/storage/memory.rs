use super::types::{ceil_seconds, ConversationKey, TTL_ABSENT};
use super::ConversationStore;
use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::Range;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug)]
struct Entry {
    messages: Vec<Message>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local conversation store
///
/// Keeps the same key layout and sliding TTL as the redis store. Expired
/// entries are dropped lazily when touched, or eagerly by
/// [`purge_expired`](Self::purge_expired). Contents do not survive a restart.
#[derive(Debug)]
pub struct InMemoryConversationStore {
    keys: ConversationKey,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryConversationStore {
    /// Create an empty store
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_memory::storage::InMemoryConversationStore;
    /// use std::time::Duration;
    ///
    /// let store = InMemoryConversationStore::new("chat:memory:", Duration::from_secs(3600));
    /// ```
    pub fn new(key_prefix: &str, ttl: Duration) -> Self {
        Self {
            keys: ConversationKey::new(key_prefix),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remove every expired conversation, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired conversations");
        }
        purged
    }

    /// Run `f` against the live entry for `conversation_id`, resetting its TTL
    ///
    /// Returns None when the conversation is absent or expired.
    async fn touch<T>(&self, conversation_id: &str, f: impl FnOnce(&[Message]) -> T) -> Option<T> {
        let key = self.keys.key(conversation_id);
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(&key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = now + self.ttl;
                Some(f(&entry.messages))
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Run `f` against the live entry without touching its TTL
    async fn peek<T>(&self, conversation_id: &str, f: impl FnOnce(&Entry, Instant) -> T) -> Option<T> {
        let key = self.keys.key(conversation_id);
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| f(entry, now))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        let key = self.keys.key(conversation_id);
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if entries.get(&key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(&key);
        }

        if messages.is_empty() {
            if let Some(entry) = entries.get_mut(&key) {
                entry.expires_at = now + self.ttl;
            }
            return Ok(());
        }

        let entry = entries.entry(key).or_insert_with(|| Entry {
            messages: Vec::new(),
            expires_at: now,
        });
        entry.messages.extend_from_slice(messages);
        entry.expires_at = now + self.ttl;

        tracing::debug!(
            conversation_id,
            appended = messages.len(),
            total = entry.messages.len(),
            "Appended messages"
        );
        Ok(())
    }

    async fn read_all(&self, conversation_id: &str) -> Vec<Message> {
        let messages = self
            .touch(conversation_id, |messages| messages.to_vec())
            .await
            .unwrap_or_default();
        tracing::debug!(conversation_id, count = messages.len(), "Read all messages");
        messages
    }

    async fn read_last_n(&self, conversation_id: &str, n: usize) -> Vec<Message> {
        self.touch(conversation_id, |messages| {
            let from = if n == 0 {
                0
            } else {
                messages.len().saturating_sub(n)
            };
            messages[from..].to_vec()
        })
        .await
        .unwrap_or_default()
    }

    async fn read_range(&self, conversation_id: &str, range: Range<usize>) -> Vec<Message> {
        self.touch(conversation_id, |messages| {
            let end = range.end.min(messages.len());
            let start = range.start.min(end);
            messages[start..end].to_vec()
        })
        .await
        .unwrap_or_default()
    }

    async fn clear(&self, conversation_id: &str) -> Result<()> {
        let key = self.keys.key(conversation_id);
        let removed = self.entries.write().await.remove(&key).is_some();
        tracing::info!(conversation_id, removed, "Cleared conversation");
        Ok(())
    }

    async fn exists(&self, conversation_id: &str) -> bool {
        self.peek(conversation_id, |_, _| ()).await.is_some()
    }

    async fn remaining_ttl(&self, conversation_id: &str) -> i64 {
        self.peek(conversation_id, |entry, now| {
            ceil_seconds(entry.expires_at.saturating_duration_since(now))
        })
        .await
        .unwrap_or(TTL_ABSENT)
    }

    async fn refresh_ttl(&self, conversation_id: &str) -> bool {
        let refreshed = self.touch(conversation_id, |_| ()).await.is_some();
        if refreshed {
            tracing::debug!(conversation_id, "Refreshed TTL");
        }
        refreshed
    }

    async fn count(&self, conversation_id: &str) -> usize {
        self.peek(conversation_id, |entry, _| entry.messages.len())
            .await
            .unwrap_or(0)
    }

    async fn conversation_ids(&self, id_prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .filter_map(|(key, _)| self.keys.conversation_id(key))
            .filter(|id| id.starts_with(id_prefix))
            .map(str::to_string)
            .collect();
        ids.sort();
        ids
    }
}
