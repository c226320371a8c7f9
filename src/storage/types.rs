use std::time::Duration;

/// Remaining TTL reported for a conversation that does not exist
pub const TTL_ABSENT: i64 = -2;

/// Remaining TTL reported for a key that exists without an expiry
pub const TTL_PERSISTENT: i64 = -1;

/// Maps conversation ids to store keys under a fixed prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationKey {
    prefix: String,
}

impl ConversationKey {
    /// Create a key mapper for the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for a conversation id
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_memory::storage::ConversationKey;
    ///
    /// let keys = ConversationKey::new("chat:memory:");
    /// assert_eq!(keys.key("c1"), "chat:memory:c1");
    /// ```
    pub fn key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.prefix, conversation_id)
    }

    /// Conversation id for a store key, None if the key is outside the prefix
    pub fn conversation_id<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }

    /// SCAN/KEYS glob matching every conversation whose id starts with `id_prefix`
    ///
    /// Glob metacharacters in the prefix and id prefix are escaped so they
    /// match literally.
    pub fn scan_pattern(&self, id_prefix: &str) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + id_prefix.len() + 1);
        for c in self.prefix.chars().chain(id_prefix.chars()) {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

/// Whole seconds remaining, rounded up so a fresh window reports its full length
pub(crate) fn ceil_seconds(remaining: Duration) -> i64 {
    let millis = remaining.as_millis();
    ((millis + 999) / 1000) as i64
}
