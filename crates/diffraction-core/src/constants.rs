//! Ledger constants and deployment parameters.
//!
//! All monetary values are in minor units. Both the input asset (EOS) and the
//! output asset (ATHENA) carry four decimal places, so `10_000` minor units
//! are one whole token.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Decimal places shared by both assets.
pub const ASSET_PRECISION: u8 = 4;

/// Minor units per whole token (`10^ASSET_PRECISION`).
pub const UNITS_PER_TOKEN: u64 = 10_000;

/// Largest magnitude an on-chain asset amount may hold (`2^62 - 1`).
pub const MAX_ASSET_AMOUNT: i64 = (1 << 62) - 1;

/// Output capacity of a full round, in ATHENA minor units (300,000 ATHENA).
pub const LEVEL: u64 = 3_000_000_000;

/// Factor the rate is divided by each time a round boundary is crossed.
pub const RATE_DECAY: f64 = 1.015;

/// Lifetime output supply, in ATHENA minor units (79,003,000 ATHENA).
pub const SEND_LIMIT: u64 = 790_030_000_000;

/// Output units per input unit in round 1.
pub const INIT_RATE: f64 = 100.0 / 3.0;

/// Longest memo accepted on an inbound transfer, in bytes.
pub const MAX_MEMO_BYTES: usize = 256;

/// Memo attached to outbound issue transfers.
pub const ISSUE_MEMO: &str = "diffraction";

/// Memo attached to outbound refund transfers.
pub const REFUND_MEMO: &str = "diffraction refund";

/// Account the ledger receives deposits on and administers itself with.
pub const DEFAULT_LEDGER_ACCOUNT: &str = "diffraction";

/// Contract that issues the output asset.
pub const DEFAULT_TOKEN_CONTRACT: &str = "athenastoken";

/// Contract that holds the input asset (used for refunds).
pub const DEFAULT_INPUT_CONTRACT: &str = "eosio.token";

/// Relative tolerance used when comparing a stored rate to the schedule.
pub const RATE_TOLERANCE: f64 = 1e-9;

/// Distribution parameters fixed at deployment.
///
/// [`Default`] yields the production constants. Tests and alternative
/// deployments may use smaller values, but every instance must pass
/// [`validate`](Self::validate) before an engine accepts it.
///
/// # Examples
///
/// ```
/// use diffraction_core::constants::{DistributionParams, LEVEL, SEND_LIMIT};
/// let p = DistributionParams::default();
/// assert_eq!(p.level, LEVEL);
/// assert_eq!(p.send_limit, SEND_LIMIT);
/// assert_eq!(p.final_round(), 264);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    /// Output capacity of a full round.
    pub level: u64,
    /// Per-round rate divisor, strictly greater than 1.
    pub rate_decay: f64,
    /// Lifetime output supply.
    pub send_limit: u64,
    /// Rate of round 1.
    pub init_rate: f64,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            level: LEVEL,
            rate_decay: RATE_DECAY,
            send_limit: SEND_LIMIT,
            init_rate: INIT_RATE,
        }
    }
}

impl DistributionParams {
    /// Reject parameter sets the engine cannot run on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level == 0 {
            return Err(ConfigError::InvalidParams("level must be positive".into()));
        }
        if self.send_limit == 0 {
            return Err(ConfigError::InvalidParams("send_limit must be positive".into()));
        }
        if self.send_limit > MAX_ASSET_AMOUNT as u64 {
            return Err(ConfigError::InvalidParams(format!(
                "send_limit {} exceeds the asset maximum {MAX_ASSET_AMOUNT}",
                self.send_limit
            )));
        }
        if self.send_limit.div_ceil(self.level) > u32::MAX as u64 {
            return Err(ConfigError::InvalidParams("round count exceeds u32".into()));
        }
        if !self.rate_decay.is_finite() || self.rate_decay <= 1.0 {
            return Err(ConfigError::InvalidParams(format!(
                "rate_decay must be a finite value above 1, got {}",
                self.rate_decay
            )));
        }
        if !self.init_rate.is_finite() || self.init_rate <= 0.0 {
            return Err(ConfigError::InvalidParams(format!(
                "init_rate must be a finite positive value, got {}",
                self.init_rate
            )));
        }
        Ok(())
    }

    /// Index of the last round. The last round is shorter than `level` when
    /// `send_limit` is not a multiple of it.
    pub fn final_round(&self) -> u32 {
        self.send_limit.div_ceil(self.level) as u32
    }

    /// Output capacity of round `round` (1-based). Zero outside the schedule.
    pub fn round_capacity(&self, round: u32) -> u64 {
        if round == 0 || round > self.final_round() {
            return 0;
        }
        let issued_before = (round as u64 - 1) * self.level;
        (self.send_limit - issued_before).min(self.level)
    }

    /// Rate of round `round` (1-based).
    ///
    /// Computed by repeated division so the result is bit-identical to the
    /// rate the engine reaches by crossing rounds one at a time.
    pub fn rate_for_round(&self, round: u32) -> f64 {
        let mut rate = self.init_rate;
        for _ in 1..round {
            rate /= self.rate_decay;
        }
        rate
    }
}
