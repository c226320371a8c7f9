//! Read-side facade over a conversation store
//!
//! Combines the store, the pagination engine and the directory into the
//! operations a request boundary exposes. Only [`HistoryService::page`] and
//! [`HistoryService::clear`] can fail; everything else degrades to
//! not-found values like the store reads it is built on.

use super::directory::{Access, ConversationDirectory, ConversationListing};
use super::pagination::{window, PageDescriptor, PageRequest};
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::message::Message;
use crate::storage::ConversationStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Existence, size and expiry of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub conversation_id: String,
    pub exists: bool,
    pub message_count: usize,
    /// Seconds until expiry, negative when absent
    pub remaining_ttl: i64,
    /// Whole hours until expiry, 0 when absent
    pub remaining_ttl_hours: i64,
}

/// Result of resetting a conversation's expiration window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub conversation_id: String,
    pub refreshed: bool,
    pub remaining_ttl: i64,
}

/// Existence of several conversations at once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCheck {
    pub total: usize,
    pub exists: BTreeMap<String, bool>,
}

/// History reads and maintenance for the request boundary
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn ConversationStore>,
    directory: ConversationDirectory,
    config: HistoryConfig,
}

impl HistoryService {
    /// Create a service over `store`
    pub fn new(store: Arc<dyn ConversationStore>, config: HistoryConfig) -> Self {
        let directory = ConversationDirectory::new(Arc::clone(&store));
        Self {
            store,
            directory,
            config,
        }
    }

    /// Page size used when the caller does not supply one
    pub fn default_page_size(&self) -> usize {
        self.config.default_page_size
    }

    /// Stored messages oldest first; `last_n` of `None` or `Some(0)` returns all
    pub async fn history(&self, conversation_id: &str, last_n: Option<usize>) -> Vec<Message> {
        match last_n {
            Some(n) if n > 0 => self.store.read_last_n(conversation_id, n).await,
            _ => self.store.read_all(conversation_id).await,
        }
    }

    /// One page of history, newest first
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::InvalidPageRequest` if `page < 1` or `size` is
    /// outside `[1, history.max_page_size]`
    pub async fn page(
        &self,
        conversation_id: &str,
        page: usize,
        size: Option<usize>,
    ) -> Result<PageDescriptor> {
        let size = size.unwrap_or(self.config.default_page_size);
        let request = PageRequest::new(page, size, self.config.max_page_size)?;

        let total = self.store.count(conversation_id).await;
        let window = window(total, request.page(), request.size());
        let forward = if window.range.is_empty() {
            Vec::new()
        } else {
            self.store
                .read_range(conversation_id, window.range.clone())
                .await
        };

        tracing::debug!(
            conversation_id,
            page,
            size,
            total,
            returned = forward.len(),
            "Read history page"
        );
        Ok(PageDescriptor::build(
            conversation_id,
            request,
            total,
            &window,
            forward,
        ))
    }

    /// Existence, message count and remaining TTL
    pub async fn info(&self, conversation_id: &str) -> ConversationInfo {
        let exists = self.store.exists(conversation_id).await;
        let message_count = self.store.count(conversation_id).await;
        let remaining_ttl = self.store.remaining_ttl(conversation_id).await;
        ConversationInfo {
            conversation_id: conversation_id.to_string(),
            exists,
            message_count,
            remaining_ttl,
            remaining_ttl_hours: if remaining_ttl > 0 {
                remaining_ttl / 3600
            } else {
                0
            },
        }
    }

    /// Reset the expiration window without touching content
    pub async fn refresh(&self, conversation_id: &str) -> RefreshOutcome {
        let refreshed = self.store.refresh_ttl(conversation_id).await;
        let remaining_ttl = self.store.remaining_ttl(conversation_id).await;
        RefreshOutcome {
            conversation_id: conversation_id.to_string(),
            refreshed,
            remaining_ttl,
        }
    }

    /// Delete a conversation
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::StoreUnavailable` if the store rejects the delete
    pub async fn clear(&self, conversation_id: &str) -> Result<()> {
        self.store.clear(conversation_id).await
    }

    /// Which of `ids` exist; duplicate ids are reported once
    pub async fn batch_exists(&self, ids: &[String]) -> BatchCheck {
        let mut exists = BTreeMap::new();
        for id in ids {
            if !exists.contains_key(id) {
                exists.insert(id.clone(), self.store.exists(id).await);
            }
        }
        BatchCheck {
            total: exists.len(),
            exists,
        }
    }

    /// Ids of live conversations starting with `id_prefix`
    pub async fn list_conversation_ids(&self, id_prefix: &str) -> Vec<String> {
        self.directory.list_conversation_ids(id_prefix).await
    }

    /// Detailed listing for administrators
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::Forbidden` unless `access` is granted
    pub async fn conversations(&self, access: Access, id_prefix: &str) -> Result<ConversationListing> {
        self.directory.conversations(access, id_prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::storage::redis_store::degrade;
    use crate::storage::{InMemoryConversationStore, MockConversationStore, TTL_ABSENT};
    use std::ops::Range;
    use crate::test_utils::numbered_messages;
    use std::time::Duration;

    fn service() -> (HistoryService, Arc<dyn ConversationStore>) {
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new(
            "chat:memory:",
            Duration::from_secs(7200),
        ));
        (
            HistoryService::new(Arc::clone(&store), HistoryConfig::default()),
            store,
        )
    }

    async fn seed(store: &Arc<dyn ConversationStore>, id: &str, n: usize) {
        store.append(id, &numbered_messages(n)).await.unwrap();
    }

    fn contents(messages: &[Message]) -> Vec<String> {
        messages.iter().map(|m| m.content.clone()).collect()
    }

    #[tokio::test]
    async fn test_empty_conversation_page() {
        let (service, _) = service();
        let page = service.page("c1", 1, Some(10)).await.unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[tokio::test]
    async fn test_pages_walk_backward_in_time() {
        let (service, store) = service();
        seed(&store, "c1", 25).await;

        let first = service.page("c1", 1, Some(10)).await.unwrap();
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.messages.len(), 10);
        assert_eq!(first.messages[0].content, "m24");
        assert_eq!(first.messages[9].content, "m15");

        let last = service.page("c1", 3, Some(10)).await.unwrap();
        assert_eq!(contents(&last.messages), vec!["m4", "m3", "m2", "m1", "m0"]);
        assert!(!last.has_next);
        assert!(last.has_previous);
    }

    #[tokio::test]
    async fn test_page_uses_default_size() {
        let (service, store) = service();
        seed(&store, "c1", 15).await;
        let page = service.page("c1", 1, None).await.unwrap();
        assert_eq!(page.size, 10);
        assert_eq!(page.messages.len(), 10);
    }

    #[tokio::test]
    async fn test_page_rejects_invalid_request() {
        let (service, _) = service();
        for (page, size) in [(0, 10), (1, 0), (1, 101)] {
            let err = service.page("c1", page, Some(size)).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<MemoryError>(),
                Some(MemoryError::InvalidPageRequest(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_history_last_n() {
        let (service, store) = service();
        seed(&store, "c1", 6).await;
        assert_eq!(service.history("c1", None).await.len(), 6);
        assert_eq!(service.history("c1", Some(0)).await.len(), 6);
        assert_eq!(contents(&service.history("c1", Some(2)).await), vec!["m4", "m5"]);
    }

    #[tokio::test]
    async fn test_info_for_present_and_absent() {
        let (service, store) = service();
        seed(&store, "c1", 3).await;

        let info = service.info("c1").await;
        assert!(info.exists);
        assert_eq!(info.message_count, 3);
        assert_eq!(info.remaining_ttl_hours, 2);

        let missing = service.info("nope").await;
        assert!(!missing.exists);
        assert_eq!(missing.remaining_ttl, TTL_ABSENT);
        assert_eq!(missing.remaining_ttl_hours, 0);
    }

    #[tokio::test]
    async fn test_refresh_and_clear() {
        let (service, store) = service();
        seed(&store, "c1", 1).await;

        let outcome = service.refresh("c1").await;
        assert!(outcome.refreshed);
        assert_eq!(outcome.remaining_ttl, 7200);

        service.clear("c1").await.unwrap();
        service.clear("c1").await.unwrap();
        assert!(!service.refresh("c1").await.refreshed);
    }

    #[tokio::test]
    async fn test_batch_exists() {
        let (service, store) = service();
        seed(&store, "a", 1).await;
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];

        let check = service.batch_exists(&ids).await;
        assert_eq!(check.total, 2);
        assert_eq!(check.exists.get("a"), Some(&true));
        assert_eq!(check.exists.get("b"), Some(&false));
    }

    #[tokio::test]
    async fn test_clear_failure_propagates() {
        let mut mock = MockConversationStore::new();
        mock.expect_clear().returning(|_| {
            Err(MemoryError::StoreUnavailable("connection refused".to_string()).into())
        });
        let service = HistoryService::new(Arc::new(mock), HistoryConfig::default());

        let err = service.clear("c1").await.unwrap_err();
        assert!(err
            .downcast_ref::<MemoryError>()
            .is_some_and(MemoryError::is_store_unavailable));
    }

    #[tokio::test]
    async fn test_degraded_reads_show_no_history() {
        let mut mock = MockConversationStore::new();
        mock.expect_count().returning(|_| 0);
        let service = HistoryService::new(Arc::new(mock), HistoryConfig::default());

        let page = service.page("c1", 1, None).await.unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total, 0);
    }

    /// Store whose backend is unreachable: every read takes the degraded path
    struct UnreachableStore;

    fn lost<T>() -> Result<T> {
        Err(MemoryError::StoreUnavailable("connection refused".to_string()).into())
    }

    #[async_trait::async_trait]
    impl ConversationStore for UnreachableStore {
        async fn append(&self, _: &str, _: &[Message]) -> Result<()> {
            lost()
        }
        async fn read_all(&self, id: &str) -> Vec<Message> {
            degrade(id, "read_all", lost(), Vec::new())
        }
        async fn read_last_n(&self, id: &str, _: usize) -> Vec<Message> {
            degrade(id, "read_last_n", lost(), Vec::new())
        }
        async fn read_range(&self, id: &str, _: Range<usize>) -> Vec<Message> {
            degrade(id, "read_range", lost(), Vec::new())
        }
        async fn clear(&self, _: &str) -> Result<()> {
            lost()
        }
        async fn exists(&self, id: &str) -> bool {
            degrade(id, "exists", lost(), false)
        }
        async fn remaining_ttl(&self, id: &str) -> i64 {
            degrade(id, "remaining_ttl", lost(), TTL_ABSENT)
        }
        async fn refresh_ttl(&self, id: &str) -> bool {
            degrade(id, "refresh_ttl", lost(), false)
        }
        async fn count(&self, id: &str) -> usize {
            degrade(id, "count", lost(), 0)
        }
        async fn conversation_ids(&self, prefix: &str) -> Vec<String> {
            degrade(prefix, "conversation_ids", lost(), Vec::new())
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_reads_as_no_history() {
        let service = HistoryService::new(Arc::new(UnreachableStore), HistoryConfig::default());

        let page = service.page("c1", 1, Some(10)).await.unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);

        assert!(service.history("c1", None).await.is_empty());
        assert!(service.history("c1", Some(5)).await.is_empty());

        let info = service.info("c1").await;
        assert!(!info.exists);
        assert_eq!(info.message_count, 0);
        assert_eq!(info.remaining_ttl, TTL_ABSENT);
        assert!(!service.refresh("c1").await.refreshed);
        assert!(service.list_conversation_ids("").await.is_empty());

        assert!(service.clear("c1").await.is_err());
    }
}
