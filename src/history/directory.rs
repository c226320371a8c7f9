//! Enumeration of live conversations
//!
//! Listing every conversation exposes ids across users, so the detailed
//! listing requires [`Access::Granted`]. How a caller is authorized is
//! decided outside this module; [`Access::from_admin_key`] is the adapter
//! used by the command line.

use crate::error::{MemoryError, Result};
use crate::storage::ConversationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of the caller's authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
}

impl Access {
    /// Grant access when the supplied key matches the configured one
    ///
    /// With no configured key, access is always denied.
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_memory::history::directory::Access;
    ///
    /// assert_eq!(Access::from_admin_key(Some("s3cret"), Some("s3cret")), Access::Granted);
    /// assert_eq!(Access::from_admin_key(Some("s3cret"), Some("guess")), Access::Denied);
    /// assert_eq!(Access::from_admin_key(None, Some("anything")), Access::Denied);
    /// ```
    pub fn from_admin_key(configured: Option<&str>, supplied: Option<&str>) -> Self {
        match (configured, supplied) {
            (Some(expected), Some(given)) if !expected.is_empty() && expected == given => {
                Self::Granted
            }
            _ => Self::Denied,
        }
    }
}

/// Per-conversation summary in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub conversation_id: String,
    pub message_count: usize,
    pub remaining_ttl: i64,
}

/// All matching conversations with their details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListing {
    pub total: usize,
    pub conversations: Vec<ConversationDetail>,
}

/// Read-only view over the ids held by a store
#[derive(Clone)]
pub struct ConversationDirectory {
    store: Arc<dyn ConversationStore>,
}

impl ConversationDirectory {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Ids of live conversations starting with `id_prefix`, sorted
    pub async fn list_conversation_ids(&self, id_prefix: &str) -> Vec<String> {
        self.store.conversation_ids(id_prefix).await
    }

    /// Every matching conversation with its message count and remaining TTL
    ///
    /// A conversation that expires between enumeration and inspection is
    /// left out of the listing.
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::Forbidden` unless `access` is granted
    pub async fn conversations(&self, access: Access, id_prefix: &str) -> Result<ConversationListing> {
        if access != Access::Granted {
            tracing::warn!("Rejected conversation listing without administrator access");
            return Err(MemoryError::Forbidden(
                "listing conversations requires administrator access".to_string(),
            )
            .into());
        }

        let ids = self.list_conversation_ids(id_prefix).await;
        let mut conversations = Vec::with_capacity(ids.len());
        for conversation_id in ids {
            let message_count = self.store.count(&conversation_id).await;
            if message_count == 0 {
                continue;
            }
            let remaining_ttl = self.store.remaining_ttl(&conversation_id).await;
            conversations.push(ConversationDetail {
                conversation_id,
                message_count,
                remaining_ttl,
            });
        }

        tracing::info!(total = conversations.len(), "Listed conversations");
        Ok(ConversationListing {
            total: conversations.len(),
            conversations,
        })
    }
}
