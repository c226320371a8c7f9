use chat_memory::message::Message;
use chat_memory::storage::{ConversationStore, InMemoryConversationStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn memory_store(ttl: Duration) -> Arc<dyn ConversationStore> {
    Arc::new(InMemoryConversationStore::new("it:chat:", ttl))
}

#[allow(dead_code)]
pub fn numbered(n: usize) -> Vec<Message> {
    (0..n).map(|i| Message::user(format!("m{}", i))).collect()
}

#[allow(dead_code)]
pub fn contents(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.content.clone()).collect()
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn memory_config_yaml() -> &'static str {
    r#"
store:
  backend: memory
  key_prefix: "it:chat:"
  ttl_seconds: 600
history:
  default_page_size: 10
  max_page_size: 100
admin:
  key: it-admin
"#
}
