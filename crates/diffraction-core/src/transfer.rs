//! Inbound transfer notices and outbound transfer instructions.

use serde::{Deserialize, Serialize};

use crate::account::AccountName;
use crate::asset::{Amount, Athena, Eos, RawAsset};
use crate::constants::{ISSUE_MEMO, MAX_MEMO_BYTES, REFUND_MEMO};
use crate::error::ValidationError;

/// A transfer notification, as reported by the token contract that moved
/// the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferNotice {
    /// Contract that executed the transfer.
    pub contract: AccountName,
    pub from: AccountName,
    pub to: AccountName,
    pub quantity: RawAsset,
    #[serde(default)]
    pub memo: String,
}

impl TransferNotice {
    /// Whether this notice is a deposit into `ledger`: executed by
    /// `input_contract`, addressed to the ledger and not sent by it
    /// (outgoing refunds are reported back to the sender too).
    ///
    /// A same-symbol asset issued by any other contract is not a deposit.
    pub fn is_deposit_to(&self, input_contract: &AccountName, ledger: &AccountName) -> bool {
        &self.contract == input_contract && &self.to == ledger && &self.from != ledger
    }

    /// Validate the notice and extract the deposited input amount.
    pub fn validate(&self) -> Result<Amount<Eos>, ValidationError> {
        let amount = self.quantity.to_amount::<Eos>()?;
        if self.memo.len() > MAX_MEMO_BYTES {
            return Err(ValidationError::MemoTooLong {
                len: self.memo.len(),
                max: MAX_MEMO_BYTES,
            });
        }
        Ok(amount)
    }
}

/// A transfer the ledger asks the outbound collaborator to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferInstruction {
    /// Send issued output asset to the depositor.
    Issue {
        contract: AccountName,
        to: AccountName,
        quantity: Amount<Athena>,
        memo: String,
    },
    /// Return unconverted input asset to the depositor.
    Refund {
        contract: AccountName,
        to: AccountName,
        quantity: Amount<Eos>,
        memo: String,
    },
}

impl TransferInstruction {
    pub fn issue(contract: AccountName, to: AccountName, quantity: Amount<Athena>) -> Self {
        Self::Issue {
            contract,
            to,
            quantity,
            memo: ISSUE_MEMO.to_string(),
        }
    }

    pub fn refund(contract: AccountName, to: AccountName, quantity: Amount<Eos>) -> Self {
        Self::Refund {
            contract,
            to,
            quantity,
            memo: REFUND_MEMO.to_string(),
        }
    }

    pub fn recipient(&self) -> &AccountName {
        match self {
            Self::Issue { to, .. } | Self::Refund { to, .. } => to,
        }
    }

    pub fn contract(&self) -> &AccountName {
        match self {
            Self::Issue { contract, .. } | Self::Refund { contract, .. } => contract,
        }
    }

    pub fn memo(&self) -> &str {
        match self {
            Self::Issue { memo, .. } | Self::Refund { memo, .. } => memo,
        }
    }

    /// Quantity as an untyped asset, for display and wire encoding.
    pub fn raw_quantity(&self) -> RawAsset {
        match self {
            Self::Issue { quantity, .. } => quantity.to_raw(),
            Self::Refund { quantity, .. } => quantity.to_raw(),
        }
    }
}
