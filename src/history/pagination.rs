//! Reverse-chronological pagination over a forward-indexed message list
//!
//! Page 1 holds the most recently appended messages; higher pages walk
//! backward in time. [`window`] is pure and assumes a validated request;
//! [`PageRequest::new`] is the validating boundary.

use crate::error::{MemoryError, Result};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    size: usize,
}

impl PageRequest {
    /// Validate a 1-based page number and a page size
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::InvalidPageRequest` if `page < 1` or `size` is
    /// outside `[1, max_size]`
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_memory::history::pagination::PageRequest;
    ///
    /// assert!(PageRequest::new(1, 10, 100).is_ok());
    /// assert!(PageRequest::new(0, 10, 100).is_err());
    /// assert!(PageRequest::new(1, 101, 100).is_err());
    /// ```
    pub fn new(page: usize, size: usize, max_size: usize) -> Result<Self> {
        if page < 1 {
            return Err(MemoryError::InvalidPageRequest(format!(
                "page must be at least 1, got {}",
                page
            ))
            .into());
        }
        if size < 1 || size > max_size {
            return Err(MemoryError::InvalidPageRequest(format!(
                "page size must be between 1 and {}, got {}",
                max_size, size
            ))
            .into());
        }
        Ok(Self { page, size })
    }

    /// 1-based page number
    pub fn page(&self) -> usize {
        self.page
    }

    /// Page size
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Slice boundaries and navigation metadata for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    /// Forward indices to read; empty when the page is out of range
    pub range: Range<usize>,
    /// ceil(total / size)
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Compute the window for `page` of size `size` over `total` messages
///
/// Callers reverse the messages read from `range` so the page is newest
/// first.
///
/// # Examples
///
/// ```
/// use chat_memory::history::pagination::window;
///
/// let w = window(25, 1, 10);
/// assert_eq!(w.range, 15..25);
/// assert_eq!(w.total_pages, 3);
/// assert!(w.has_next);
///
/// let last = window(25, 3, 10);
/// assert_eq!(last.range, 0..5);
/// assert!(!last.has_next);
/// ```
pub fn window(total: usize, page: usize, size: usize) -> PageWindow {
    let total_pages = total.div_ceil(size);
    let has_next = page < total_pages;
    let has_previous = page > 1;

    // Messages newer than this page
    let skipped = page.saturating_sub(1).saturating_mul(size);
    let range = if skipped >= total {
        0..0
    } else {
        let to_exclusive = total - skipped;
        let from = to_exclusive.saturating_sub(size);
        from..to_exclusive
    };

    PageWindow {
        range,
        total_pages,
        has_next,
        has_previous,
    }
}

/// One page of a conversation, newest message first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    pub conversation_id: String,
    pub page: usize,
    pub size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub messages: Vec<Message>,
}

impl PageDescriptor {
    /// Assemble a descriptor from a window and the forward-ordered slice read for it
    pub fn build(
        conversation_id: &str,
        request: PageRequest,
        total: usize,
        window: &PageWindow,
        mut forward: Vec<Message>,
    ) -> Self {
        forward.reverse();
        Self {
            conversation_id: conversation_id.to_string(),
            page: request.page(),
            size: request.size(),
            total,
            total_pages: window.total_pages,
            has_next: window.has_next,
            has_previous: window.has_previous,
            messages: forward,
        }
    }
}
