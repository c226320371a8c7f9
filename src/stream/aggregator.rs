//! Reduction of streamed text fragments into one message
//!
//! A generation source may emit pure deltas, cumulative snapshots of the
//! text so far, or retried duplicates, and may switch between them within a
//! single response. [`FragmentAccumulator::push`] folds each fragment into
//! the best-known text without duplicating content in any of those modes.
//!
//! # Examples
//!
//! ```
//! use chat_memory::stream::aggregator::reduce;
//!
//! assert_eq!(reduce(["Hi", "Hi there", "Hi there!"]), "Hi there!");
//! assert_eq!(reduce(["Hi", " there", "!"]), "Hi there!");
//! assert_eq!(reduce(["Hi", "Hi", " there"]), "Hi there");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How a fragment was folded into the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    /// The accumulator was empty and took the fragment
    Started,
    /// The fragment extended the known text as a cumulative snapshot
    Replaced,
    /// The fragment was appended as new text
    Appended,
    /// The fragment was already covered by the known text
    Discarded,
}

/// Best-known reduced text for one response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentAccumulator {
    text: String,
}

impl FragmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the accumulated text
    ///
    /// Containment checks run before concatenation; reordering them makes
    /// cumulative sources duplicate their own text.
    pub fn push(&mut self, fragment: &str) -> Fold {
        if self.text.is_empty() {
            self.text.push_str(fragment);
            Fold::Started
        } else if fragment == self.text {
            Fold::Discarded
        } else if fragment.starts_with(self.text.as_str()) {
            self.text.replace_range(.., fragment);
            Fold::Replaced
        } else if self.text.starts_with(fragment) || self.text.contains(fragment) {
            Fold::Discarded
        } else {
            self.text.push_str(fragment);
            Fold::Appended
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Reduce a finite fragment sequence to its final text
pub fn reduce<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut acc = FragmentAccumulator::new();
    for fragment in fragments {
        acc.push(fragment.as_ref());
    }
    acc.into_text()
}

/// Lifecycle of one streamed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Empty,
    Accumulating,
    Complete,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Label used for metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Accumulating => "accumulating",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    acc: FragmentAccumulator,
    state: TurnState,
    fragments: usize,
}

/// Terminal snapshot handed to persistence, produced exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub state: TurnState,
    pub text: String,
    pub fragments: usize,
}

/// Accumulator shared between fragment delivery and completion handling
///
/// Every fold and terminal transition runs under one lock, so a completion
/// racing a final in-flight fragment sees either all of it or none of it.
/// After the first terminal transition later fragments and transitions are
/// ignored.
#[derive(Debug)]
pub struct StreamAggregator {
    inner: Mutex<Inner>,
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                acc: FragmentAccumulator::new(),
                state: TurnState::Empty,
                fragments: 0,
            }),
        }
    }

    // The state stays consistent even if a holder panicked mid-push
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold a fragment; returns None once the response has finished
    pub fn push(&self, fragment: &str) -> Option<Fold> {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            tracing::debug!(state = %inner.state, "Ignoring fragment after terminal state");
            return None;
        }
        inner.state = TurnState::Accumulating;
        inner.fragments += 1;
        Some(inner.acc.push(fragment))
    }

    /// Mark the stream complete; Some only for the first terminal transition
    pub fn complete(&self) -> Option<Finished> {
        self.finish(TurnState::Complete)
    }

    /// Mark the stream failed; Some only for the first terminal transition
    pub fn fail(&self) -> Option<Finished> {
        self.finish(TurnState::Failed)
    }

    fn finish(&self, state: TurnState) -> Option<Finished> {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return None;
        }
        inner.state = state;
        Some(Finished {
            state,
            text: inner.acc.text().to_string(),
            fragments: inner.fragments,
        })
    }

    pub fn state(&self) -> TurnState {
        self.lock().state
    }

    /// Current reduced text
    pub fn text(&self) -> String {
        self.lock().acc.text().to_string()
    }
}
