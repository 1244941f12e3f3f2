//! The distribution state record.
//!
//! Exactly one [`DistributionState`] exists per ledger. It is replaced
//! wholesale by committed engine transitions and by the administrative
//! toggles; it has no behaviour beyond those toggles and its invariant check.

use serde::{Deserialize, Serialize};

use crate::asset::{Amount, Athena, Eos};
use crate::constants::{DistributionParams, RATE_TOLERANCE};
use crate::error::DistributionError;

/// Observable phase of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Deposits are converted.
    Accepting,
    /// Deposits are rejected: not yet started, stopped, or supply exhausted.
    Closed,
}

/// Persistent progress of the distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionState {
    /// Current round, starting at 1.
    pub round: u32,
    /// Output capacity left in the current round.
    pub round_remain: Amount<Athena>,
    /// Output issued across all rounds.
    pub total_issued: Amount<Athena>,
    /// Input retained across all deposits (refunds excluded).
    pub total_received: Amount<Eos>,
    /// Output units per input unit in the current round.
    pub rate: f64,
    /// Whether deposits are accepted.
    pub available: bool,
}

impl DistributionState {
    /// The state a ledger is created with (and reset to).
    pub fn initial(params: &DistributionParams) -> Self {
        Self {
            round: 1,
            round_remain: Amount::new(params.level.min(params.send_limit)),
            total_issued: Amount::ZERO,
            total_received: Amount::ZERO,
            rate: params.init_rate,
            available: false,
        }
    }

    pub fn activate(&mut self) {
        self.available = true;
    }

    pub fn deactivate(&mut self) {
        self.available = false;
    }

    pub fn reset(&mut self, params: &DistributionParams) {
        *self = Self::initial(params);
    }

    pub fn phase(&self) -> Phase {
        if self.available {
            Phase::Accepting
        } else {
            Phase::Closed
        }
    }

    /// Whether the whole supply has been issued.
    pub fn is_exhausted(&self, params: &DistributionParams) -> bool {
        self.total_issued.units() >= params.send_limit
    }

    /// Output still obtainable across all remaining rounds.
    pub fn remaining_supply(&self, params: &DistributionParams) -> Amount<Athena> {
        Amount::new(params.send_limit.saturating_sub(self.total_issued.units()))
    }

    /// Verify the structural invariants against `params`.
    ///
    /// `available` is not constrained here: an administrator may reopen an
    /// exhausted ledger, and the engine then rejects deposits itself.
    pub fn check_invariants(&self, params: &DistributionParams) -> Result<(), DistributionError> {
        let invalid = |msg: String| Err(DistributionError::InvalidState(msg));

        if self.round == 0 {
            return invalid("round must be at least 1".into());
        }
        if self.round > params.final_round() {
            return invalid(format!(
                "round {} is past the final round {}",
                self.round,
                params.final_round()
            ));
        }
        if self.total_issued.units() > params.send_limit {
            return invalid(format!(
                "total issued {} exceeds send limit {}",
                self.total_issued.units(),
                params.send_limit
            ));
        }
        if self.round_remain.units() > params.level {
            return invalid(format!(
                "round remain {} exceeds level {}",
                self.round_remain.units(),
                params.level
            ));
        }
        let supply_left = params.send_limit - self.total_issued.units();
        if self.round_remain.units() > supply_left {
            return invalid(format!(
                "round remain {} exceeds remaining supply {supply_left}",
                self.round_remain.units()
            ));
        }
        let expected = params.rate_for_round(self.round);
        if !self.rate.is_finite() || ((self.rate - expected) / expected).abs() > RATE_TOLERANCE {
            return invalid(format!(
                "rate {} does not match round {} rate {expected}",
                self.rate, self.round
            ));
        }
        Ok(())
    }
}
