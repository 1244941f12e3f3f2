//! Round schedule walking.
//!
//! The schedule from a given state onward: the current round with whatever
//! capacity it has left, then every later round at full capacity, the last
//! one truncated to the remaining supply.

use diffraction_core::asset::{Amount, Athena};
use diffraction_core::constants::DistributionParams;
use diffraction_core::state::DistributionState;

/// One round of the schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundInfo {
    pub round: u32,
    /// Output capacity still available in this round.
    pub capacity: Amount<Athena>,
    pub rate: f64,
}

impl RoundInfo {
    /// Input that buys the whole of this round, ignoring truncation.
    pub fn input_cost(&self) -> f64 {
        self.capacity.units() as f64 / self.rate
    }
}

/// Iterator over the rounds still open from a state.
#[derive(Debug, Clone)]
pub struct RoundSchedule {
    params: DistributionParams,
    round: u32,
    rate: f64,
    next_capacity: u64,
    supply_left: u64,
}

impl RoundSchedule {
    /// Schedule of a fresh ledger.
    pub fn new(params: &DistributionParams) -> Self {
        Self::from_state(params, &DistributionState::initial(params))
    }

    /// Schedule continuing from `state`.
    pub fn from_state(params: &DistributionParams, state: &DistributionState) -> Self {
        let supply_left = params.send_limit.saturating_sub(state.total_issued.units());
        Self {
            params: *params,
            round: state.round,
            rate: state.rate,
            next_capacity: state.round_remain.units().min(supply_left),
            supply_left,
        }
    }
}

impl Iterator for RoundSchedule {
    type Item = RoundInfo;

    fn next(&mut self) -> Option<RoundInfo> {
        if self.supply_left == 0 {
            return None;
        }
        let info = RoundInfo {
            round: self.round,
            capacity: Amount::new(self.next_capacity),
            rate: self.rate,
        };
        self.supply_left -= self.next_capacity;
        self.next_capacity = self.supply_left.min(self.params.level);
        self.round = self.round.saturating_add(1);
        self.rate /= self.params.rate_decay;
        Some(info)
    }
}

/// Approximate input needed to buy out the remaining supply from `state`.
///
/// Truncation inside the engine means the true threshold can differ by a
/// few minor units per round; use this for previews only.
pub fn input_to_exhaust(params: &DistributionParams, state: &DistributionState) -> u64 {
    RoundSchedule::from_state(params, state)
        .map(|r| r.input_cost())
        .sum::<f64>()
        .ceil() as u64
}
