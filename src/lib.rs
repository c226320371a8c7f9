//! chat-memory - conversation memory for chat services
//!
//! Persists multi-turn dialogue in an expiring store, serves windowed and
//! paginated history reads, and reduces a token-streamed model reply into a
//! single stored message.
//!
//! # Architecture
//!
//! - `storage`: `ConversationStore` trait with redis and in-memory implementations
//! - `history`: pagination engine, conversation directory and the read-side service
//! - `stream`: fragment aggregator and the turn driver that persists replies
//! - `message`: message value types
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`, `commands`: command-line boundary
//!
//! # Example
//!
//! ```no_run
//! use chat_memory::{storage, Config, HistoryService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = storage::connect(&config.store).await?;
//!     let history = HistoryService::new(store, config.history.clone());
//!     let page = history.page("user-42", 1, Some(20)).await?;
//!     println!("{} of {} pages", page.page, page.total_pages);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod message;
pub mod storage;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use error::{MemoryError, Result};
pub use history::{HistoryService, PageDescriptor};
pub use message::{Message, Role};
pub use storage::ConversationStore;
pub use stream::{ChatTurn, StreamAggregator, TurnOutcome, TurnState};

#[cfg(test)]
pub mod test_utils;
