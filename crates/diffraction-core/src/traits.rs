//! Trait interfaces for the Diffraction ledger.
//!
//! These traits define the seams between crates and external collaborators:
//! - [`DistributionCalculator`]: deposit conversion (diffraction-engine implements)
//! - [`AccessControl`]: authorization of administrative commands
//!
//! Persistence and the outbound transfer outbox live in
//! [`state_store`](crate::state_store).

use serde::{Deserialize, Serialize};

use crate::account::AccountName;
use crate::asset::{Amount, Athena, Eos};
use crate::error::{AuthError, DistributionError, ValidationError};
use crate::state::DistributionState;

/// Result of converting one deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositOutcome {
    /// Output asset to send to the depositor.
    pub issued: Amount<Athena>,
    /// Input asset to return to the depositor. Non-zero only when the deposit
    /// exhausted the supply.
    pub refund: Amount<Eos>,
    /// Round boundaries crossed while converting.
    pub rounds_crossed: u32,
    /// State to commit if the caller accepts the outcome.
    pub next_state: DistributionState,
}

impl DepositOutcome {
    /// Whether this deposit closed the distribution.
    pub fn completed(&self) -> bool {
        self.next_state.round_remain.is_zero() && !self.next_state.available
    }
}

/// Pure conversion of deposits into issued output.
///
/// Implementations must be deterministic: identical `(deposit, state)`
/// arguments always yield identical results.
pub trait DistributionCalculator: Send + Sync {
    /// Convert `deposit` against `state` without checking `state.available`.
    ///
    /// Used for previews; never commit its result unless the state was
    /// accepting deposits.
    fn quote(
        &self,
        deposit: Amount<Eos>,
        state: &DistributionState,
    ) -> Result<DepositOutcome, DistributionError>;

    /// Convert a deposit as a committed ledger transition.
    ///
    /// Default implementation: reject zero deposits and closed states, then
    /// delegate to [`quote`](Self::quote).
    fn process_deposit(
        &self,
        deposit: Amount<Eos>,
        state: &DistributionState,
    ) -> Result<DepositOutcome, DistributionError> {
        if deposit.is_zero() {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if !state.available {
            return Err(DistributionError::NotAvailable);
        }
        self.quote(deposit, state)
    }
}

/// Authorizes administrative commands.
pub trait AccessControl: Send + Sync {
    /// Succeeds only if `caller` may administer the ledger.
    fn require_auth(&self, caller: &AccountName) -> Result<(), AuthError>;
}
