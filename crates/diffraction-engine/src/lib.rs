//! # diffraction-engine
//! Tiered decaying-rate distribution engine.
//!
//! Converts deposits of the input asset into issued output asset:
//! - **Rounds**: the output supply is split into rounds of `LEVEL` units; the
//!   last round holds whatever is left of `SEND_LIMIT`.
//! - **Decaying rate**: each round boundary divides the rate by `RATE_DECAY`.
//! - **Partial fills**: a deposit may span many rounds and ends in a partial
//!   fill of the last one it reaches.
//! - **Refunds**: a deposit that exhausts the supply gets its unconverted
//!   remainder back, and the distribution closes.
//!
//! Conversions truncate toward zero at every step, so the ledger never
//! over-issues.

pub mod engine;
pub mod schedule;

pub use engine::RateEngine;
pub use schedule::{input_to_exhaust, RoundInfo, RoundSchedule};
