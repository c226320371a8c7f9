//! Streamed responses: fragment reduction and the turn driver that persists them

pub mod aggregator;
pub mod metrics;
pub mod turn;

pub use aggregator::{reduce, FragmentAccumulator, StreamAggregator, TurnState};
pub use turn::{ChatTurn, TurnContext, TurnHandle, TurnOutcome, TurnStream};
