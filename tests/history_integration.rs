//! History reads against the in-memory store through the public API

use chat_memory::config::HistoryConfig;
use chat_memory::history::{Access, HistoryService};
use chat_memory::storage::TTL_ABSENT;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{contents, memory_store, numbered};

const WINDOW: Duration = Duration::from_secs(600);

#[tokio::test]
async fn test_pagination_scenario() {
    let store = memory_store(WINDOW);
    let history = HistoryService::new(Arc::clone(&store), HistoryConfig::default());

    let empty = history.page("c1", 1, Some(10)).await.unwrap();
    assert!(empty.messages.is_empty());
    assert_eq!(empty.total_pages, 0);
    assert!(!empty.has_next);
    assert!(!empty.has_previous);

    store.append("c1", &numbered(25)).await.unwrap();

    let first = history.page("c1", 1, Some(10)).await.unwrap();
    let expected: Vec<String> = (15..25).rev().map(|i| format!("m{}", i)).collect();
    assert_eq!(contents(&first.messages), expected);
    assert_eq!(first.total_pages, 3);
    assert!(first.has_next);

    let third = history.page("c1", 3, Some(10)).await.unwrap();
    assert_eq!(contents(&third.messages), vec!["m4", "m3", "m2", "m1", "m0"]);
    assert!(!third.has_next);
    assert!(third.has_previous);
}

#[tokio::test]
async fn test_pages_cover_every_message_once() {
    let store = memory_store(WINDOW);
    let history = HistoryService::new(Arc::clone(&store), HistoryConfig::default());
    store.append("c1", &numbered(37)).await.unwrap();

    for size in [1, 5, 7, 10, 37, 100] {
        let total_pages = history.page("c1", 1, Some(size)).await.unwrap().total_pages;
        let mut seen = Vec::new();
        for page in 1..=total_pages {
            seen.extend(contents(&history.page("c1", page, Some(size)).await.unwrap().messages));
        }
        seen.reverse();
        assert_eq!(seen, contents(&numbered(37)), "size {}", size);
    }
}

#[tokio::test]
async fn test_appends_are_read_back_in_order() {
    let store = memory_store(WINDOW);
    for batch in numbered(9).chunks(2) {
        store.append("c1", batch).await.unwrap();
    }
    assert_eq!(contents(&store.read_all("c1").await), contents(&numbered(9)));
}

#[tokio::test]
async fn test_reads_keep_the_full_window() {
    let store = memory_store(WINDOW);
    store.append("c1", &numbered(3)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(store.remaining_ttl("c1").await < WINDOW.as_secs() as i64);

    store.read_last_n("c1", 1).await;
    assert_eq!(store.remaining_ttl("c1").await, WINDOW.as_secs() as i64);
}

#[tokio::test]
async fn test_clear_then_inspect() {
    let store = memory_store(WINDOW);
    let history = HistoryService::new(Arc::clone(&store), HistoryConfig::default());
    store.append("c1", &numbered(2)).await.unwrap();

    history.clear("c1").await.unwrap();
    history.clear("c1").await.unwrap();

    let info = history.info("c1").await;
    assert!(!info.exists);
    assert_eq!(info.message_count, 0);
    assert_eq!(info.remaining_ttl, TTL_ABSENT);
}

#[tokio::test]
async fn test_directory_listing() {
    let store = memory_store(WINDOW);
    let history = HistoryService::new(Arc::clone(&store), HistoryConfig::default());
    store.append("alice-1", &numbered(3)).await.unwrap();
    store.append("alice-2", &numbered(1)).await.unwrap();
    store.append("bob-1", &numbered(2)).await.unwrap();

    assert_eq!(
        history.list_conversation_ids("alice-").await,
        vec!["alice-1", "alice-2"]
    );

    let access = Access::from_admin_key(Some("k"), Some("k"));
    let listing = history.conversations(access, "").await.unwrap();
    assert_eq!(listing.total, 3);
    let counts: Vec<usize> = listing
        .conversations
        .iter()
        .map(|c| c.message_count)
        .collect();
    assert_eq!(counts, vec![3, 1, 2]);

    assert!(history.conversations(Access::Denied, "").await.is_err());
}
