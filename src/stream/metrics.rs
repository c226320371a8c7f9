//! Turn metrics
//!
//! - `chat_turns_started_total`: Counter of turns whose stream was attached
//! - `chat_turns_active`: Gauge of turns still streaming or persisting
//! - `chat_turns_total{state}`: Counter of finished turns by terminal state
//! - `chat_turn_fragments{state}`: Histogram of fragments received per turn
//! - `chat_turn_duration_seconds{state}`: Histogram of stream-to-persist time
//! - `chat_turn_persist_failures_total`: Counter of failed turn writes
//!
//! Without an installed recorder every macro is a no-op.

use super::aggregator::TurnState;
use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Metrics for one turn, recorded at most once
///
/// Dropping an unrecorded tracker still releases the active gauge.
#[derive(Debug)]
pub struct TurnMetrics {
    start: Instant,
    recorded: AtomicBool,
}

impl TurnMetrics {
    pub fn new() -> Self {
        increment_counter!("chat_turns_started_total");
        increment_gauge!("chat_turns_active", 1.0);
        Self {
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Record the terminal state and fragment count
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_memory::stream::aggregator::TurnState;
    /// use chat_memory::stream::metrics::TurnMetrics;
    ///
    /// let metrics = TurnMetrics::new();
    /// metrics.record_finished(TurnState::Complete, 12);
    /// assert!(metrics.is_recorded());
    /// ```
    pub fn record_finished(&self, state: TurnState, fragments: usize) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }
        let label = state.as_str();
        increment_counter!("chat_turns_total", "state" => label);
        histogram!("chat_turn_fragments", fragments as f64, "state" => label);
        histogram!(
            "chat_turn_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "state" => label
        );
        decrement_gauge!("chat_turns_active", 1.0);
    }

    pub fn record_persist_failure(&self) {
        increment_counter!("chat_turn_persist_failures_total");
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TurnMetrics {
    fn drop(&mut self) {
        if !self.recorded.load(Ordering::SeqCst) {
            decrement_gauge!("chat_turns_active", 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_once() {
        let metrics = TurnMetrics::new();
        assert!(!metrics.is_recorded());
        metrics.record_finished(TurnState::Failed, 3);
        metrics.record_finished(TurnState::Complete, 9);
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_drop_without_recording() {
        let metrics = TurnMetrics::new();
        metrics.record_persist_failure();
        drop(metrics);
    }

    #[test]
    fn test_elapsed_increases() {
        let metrics = TurnMetrics::new();
        let t1 = metrics.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert!(metrics.elapsed() > t1);
    }
}
