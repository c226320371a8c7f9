//! Test utilities for chat-memory
//!
//! Temporary files, seeded stores, and assertion helpers shared by the
//! unit tests.

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::message::Message;
use crate::storage::{ConversationStore, InMemoryConversationStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory that is removed when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Write `content` to `name` inside `dir`
///
/// # Panics
///
/// Panics if the file cannot be written
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that `result` failed with a message containing `expected`
///
/// # Panics
///
/// Panics if the result is Ok or the message does not match
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Default configuration pointed at the in-memory store
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config
}

/// A complete configuration file using the in-memory store
pub fn test_config_yaml() -> String {
    r#"
store:
  backend: memory
  key_prefix: "test:chat:"
  ttl_seconds: 3600
  fallback_to_memory: true
  redis:
    url: redis://127.0.0.1:6379/0
    scan_count: 50
history:
  default_page_size: 5
  max_page_size: 50
admin:
  key: test-admin
"#
    .to_string()
}

/// Fresh in-memory store with a one-hour window
pub fn memory_store() -> Arc<dyn ConversationStore> {
    Arc::new(InMemoryConversationStore::new(
        "test:chat:",
        Duration::from_secs(3600),
    ))
}

/// `n` alternating user/assistant messages with contents `m0..m{n-1}`
pub fn numbered_messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("m{}", i))
            } else {
                Message::assistant(format!("m{}", i))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(MemoryError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_test_config_yaml_is_valid() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.validate().is_ok());
        assert!(test_config().validate().is_ok());
    }

    #[tokio::test]
    async fn test_numbered_messages_alternate_roles() {
        let store = memory_store();
        store.append("c1", &numbered_messages(4)).await.unwrap();
        let stored = store.read_all("c1").await;
        assert_eq!(stored[0].role, crate::message::Role::User);
        assert_eq!(stored[1].role, crate::message::Role::Assistant);
        assert_eq!(stored[3].content, "m3");
    }
}
