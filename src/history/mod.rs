//! Read-side history: pagination, directory, and the service combining them

pub mod directory;
pub mod pagination;
pub mod service;

pub use directory::{Access, ConversationDetail, ConversationDirectory, ConversationListing};
pub use pagination::{PageDescriptor, PageRequest, PageWindow};
pub use service::{BatchCheck, ConversationInfo, HistoryService, RefreshOutcome};
