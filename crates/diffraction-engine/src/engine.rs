//! Rate engine implementing the [`DistributionCalculator`] trait.
//!
//! Walks the round schedule from the current state, filling whole rounds
//! while the deposit can buy them and finishing with a partial fill. The
//! conversion uses `f64` for the rate and truncates every conversion toward
//! zero, performing the same operations in the same order on every call, so
//! results replay bit for bit.

use diffraction_core::asset::{Amount, Eos};
use diffraction_core::constants::DistributionParams;
use diffraction_core::error::{ConfigError, DistributionError, ValidationError};
use diffraction_core::state::DistributionState;
use diffraction_core::traits::{DepositOutcome, DistributionCalculator};
use tracing::trace;

/// The production distribution calculator.
#[derive(Debug, Clone, Default)]
pub struct RateEngine {
    params: DistributionParams,
}

impl RateEngine {
    /// Engine running on the production constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine running on custom parameters.
    pub fn with_params(params: DistributionParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }
}

/// Output bought by `input` at `rate`, truncated toward zero.
fn convert(input: u64, rate: f64) -> u64 {
    (input as f64 * rate) as u64
}

impl DistributionCalculator for RateEngine {
    fn quote(
        &self,
        deposit: Amount<Eos>,
        state: &DistributionState,
    ) -> Result<DepositOutcome, DistributionError> {
        let received = deposit.units();
        if received == 0 {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if !(state.rate.is_finite() && state.rate > 0.0) {
            return Err(DistributionError::InvalidState(format!(
                "rate {} is not a positive number",
                state.rate
            )));
        }

        let p = &self.params;
        let mut capacity_left = p
            .send_limit
            .checked_sub(state.total_issued.units())
            .ok_or(DistributionError::Overflow)?;
        // Reopened after completion: nothing left to sell.
        if capacity_left == 0 {
            return Err(DistributionError::NotAvailable);
        }

        // The final round may be shorter than `level`.
        let mut remain = state.round_remain.units().min(capacity_left);
        let mut round = state.round;
        let mut rate = state.rate;
        let mut input_left = received;
        let mut issued: u64 = 0;
        let mut exhausted = false;

        // `>=`: a deposit that exactly fills the round moves on to the next
        // one, so a committed open round always has capacity left.
        while convert(input_left, rate) >= remain {
            // Input that buys the rest of this round; the cast truncates and
            // saturates at zero.
            input_left = (input_left as f64 - remain as f64 / rate) as u64;
            issued += remain;
            capacity_left -= remain;
            if capacity_left == 0 {
                exhausted = true;
                break;
            }
            remain = capacity_left.min(p.level);
            round = round.checked_add(1).ok_or(DistributionError::Overflow)?;
            rate /= p.rate_decay;
            trace!(round, rate, remain, "crossed into next round");
        }

        let rounds_crossed = round - state.round;

        if exhausted {
            let refund = input_left;
            if refund >= received {
                return Err(DistributionError::RefundInvariantViolation {
                    refund,
                    deposit: received,
                });
            }
            let total_issued = state
                .total_issued
                .units()
                .checked_add(issued)
                .filter(|total| *total == p.send_limit)
                .ok_or(DistributionError::Overflow)?;
            let total_received = state
                .total_received
                .checked_add(Amount::new(received - refund))
                .ok_or(DistributionError::Overflow)?;

            return Ok(DepositOutcome {
                issued: Amount::new(issued),
                refund: Amount::new(refund),
                rounds_crossed,
                next_state: DistributionState {
                    round,
                    round_remain: Amount::ZERO,
                    total_issued: Amount::new(total_issued),
                    total_received,
                    rate,
                    available: false,
                },
            });
        }

        // Partial fill; the loop exit guarantees `filled < remain`.
        let filled = convert(input_left, rate);
        issued += filled;
        remain -= filled;

        let total_issued = state
            .total_issued
            .units()
            .checked_add(issued)
            .filter(|total| *total <= p.send_limit)
            .ok_or(DistributionError::Overflow)?;
        let total_received = state
            .total_received
            .checked_add(deposit)
            .ok_or(DistributionError::Overflow)?;

        Ok(DepositOutcome {
            issued: Amount::new(issued),
            refund: Amount::ZERO,
            rounds_crossed,
            next_state: DistributionState {
                round,
                round_remain: Amount::new(remain),
                total_issued: Amount::new(total_issued),
                total_received,
                rate,
                available: state.available,
            },
        })
    }
}
