//! Shared test helpers for scenario and end-to-end tests.

use diffraction_core::account::AccountName;
use diffraction_core::asset::{Amount, AssetKind, Eos, RawAsset};
use diffraction_core::auth::SingleAuthority;
use diffraction_core::constants::DistributionParams;
use diffraction_core::state::DistributionState;
use diffraction_core::state_store::MemoryStateStore;
use diffraction_core::state_store::StateStore;
use diffraction_core::transfer::{TransferInstruction, TransferNotice};
use diffraction_engine::RateEngine;
use diffraction_node_lib::{DepositDisposition, DepositReceipt, Ledger, LedgerAccounts};

pub type TestLedger = Ledger<MemoryStateStore, SingleAuthority>;

pub fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

/// The default ledger account, which is also its administrator.
pub fn admin() -> AccountName {
    LedgerAccounts::default().ledger
}

/// Closed in-memory ledger with production parameters.
pub fn memory_ledger() -> TestLedger {
    ledger_with_state(DistributionState::initial(&DistributionParams::default()))
}

/// In-memory ledger with production parameters, already accepting deposits.
pub fn open_memory_ledger() -> TestLedger {
    let l = memory_ledger();
    l.activate(&admin()).unwrap();
    l
}

/// In-memory ledger seeded with an arbitrary state.
pub fn ledger_with_state(state: DistributionState) -> TestLedger {
    let accounts = LedgerAccounts::default();
    let access = SingleAuthority::new(accounts.ledger.clone());
    Ledger::new(
        accounts,
        RateEngine::new(),
        MemoryStateStore::with_state(state),
        access,
    )
}

/// In-memory ledger with custom parameters, accepting deposits.
pub fn open_ledger_with(params: DistributionParams) -> TestLedger {
    let accounts = LedgerAccounts::default();
    let access = SingleAuthority::new(accounts.ledger.clone());
    let engine = RateEngine::with_params(params).unwrap();
    let mut state = DistributionState::initial(&params);
    state.activate();
    Ledger::new(
        accounts,
        engine,
        MemoryStateStore::with_state(state),
        access,
    )
}

/// Accepting state partway through the schedule.
pub fn state_at(
    params: &DistributionParams,
    round: u32,
    round_remain: u64,
    total_issued: u64,
    total_received: u64,
) -> DistributionState {
    DistributionState {
        round,
        round_remain: Amount::new(round_remain),
        total_issued: Amount::new(total_issued),
        total_received: Amount::new(total_received),
        rate: params.rate_for_round(round),
        available: true,
    }
}

/// Input asset with the given minor-unit amount.
pub fn eos(amount: i64) -> RawAsset {
    RawAsset {
        amount,
        symbol: Eos::symbol(),
    }
}

/// The default input-asset contract.
pub fn input_contract() -> AccountName {
    LedgerAccounts::default().input_contract
}

/// Deposit notice from `from` to the default ledger account, executed by the
/// input-asset contract.
pub fn deposit_notice(from: &str, amount: i64) -> TransferNotice {
    TransferNotice {
        contract: input_contract(),
        from: name(from),
        to: admin(),
        quantity: eos(amount),
        memo: String::new(),
    }
}

/// Unwrap an accepted disposition.
pub fn accepted(disposition: DepositDisposition) -> DepositReceipt {
    match disposition {
        DepositDisposition::Accepted(receipt) => receipt,
        DepositDisposition::Ignored => panic!("expected deposit to be accepted, was ignored"),
    }
}

/// Transfers committed to the ledger's outbox so far.
pub fn sent(l: &TestLedger) -> usize {
    l.inspect(|store| store.outbox().len())
}

/// Every instruction in the ledger's outbox, oldest first.
pub fn outbox(l: &TestLedger) -> Vec<TransferInstruction> {
    l.inspect(|store| store.outbox().to_vec())
}

/// Commits applied to the ledger's store so far.
pub fn commits(l: &TestLedger) -> u64 {
    l.inspect(|store| store.commit_count().unwrap())
}
