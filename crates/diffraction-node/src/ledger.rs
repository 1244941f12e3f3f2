//! Ledger orchestration.
//!
//! [`Ledger`] is the single entry point a host drives: deposit notices go in
//! through [`Ledger::on_transfer`], administrative commands through
//! [`Ledger::activate`] / [`Ledger::deactivate`] / [`Ledger::reset`].
//!
//! Every deposit runs validate → load → compute → commit while holding one
//! mutex over the store, so deposits are applied strictly one at a time
//! against the latest committed state. The next state and the issue/refund
//! instructions it produced are committed together in one store write; the
//! host executes instructions from the store's outbox. Any failure leaves
//! both the state and the outbox untouched.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use diffraction_core::account::AccountName;
use diffraction_core::asset::{Amount, Athena, Eos};
use diffraction_core::constants::{
    DEFAULT_INPUT_CONTRACT, DEFAULT_LEDGER_ACCOUNT, DEFAULT_TOKEN_CONTRACT, DistributionParams,
};
use diffraction_core::error::{DiffractionError, DistributionError};
use diffraction_core::state::DistributionState;
use diffraction_core::state_store::StateStore;
use diffraction_core::traits::{AccessControl, DepositOutcome, DistributionCalculator};
use diffraction_core::transfer::{TransferInstruction, TransferNotice};
use diffraction_engine::RateEngine;

/// Accounts the ledger is deployed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAccounts {
    /// The ledger's own account; deposits are transfers addressed to it.
    pub ledger: AccountName,
    /// Contract that issues the output asset.
    pub token_contract: AccountName,
    /// Contract of the input asset. Only its transfers are deposits, and
    /// refunds are paid through it.
    pub input_contract: AccountName,
}

impl Default for LedgerAccounts {
    fn default() -> Self {
        let name = |s: &str| AccountName::new(s).expect("default account names are valid");
        Self {
            ledger: name(DEFAULT_LEDGER_ACCOUNT),
            token_contract: name(DEFAULT_TOKEN_CONTRACT),
            input_contract: name(DEFAULT_INPUT_CONTRACT),
        }
    }
}

/// What happened to a transfer notice.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositDisposition {
    /// The notice was not a deposit into this ledger.
    Ignored,
    /// The deposit was converted and committed.
    Accepted(DepositReceipt),
}

/// Record of one committed deposit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositReceipt {
    pub depositor: AccountName,
    pub deposit: Amount<Eos>,
    pub issued: Amount<Athena>,
    pub refund: Amount<Eos>,
    pub rounds_crossed: u32,
    /// Instructions committed to the outbox, in execution order.
    pub transfers: Vec<TransferInstruction>,
    /// State committed by this deposit.
    pub state: DistributionState,
}

/// A running distribution ledger.
pub struct Ledger<S, A> {
    accounts: LedgerAccounts,
    params: DistributionParams,
    calculator: Box<dyn DistributionCalculator>,
    access: A,
    store: Mutex<S>,
}

impl<S: StateStore, A: AccessControl> Ledger<S, A> {
    /// Ledger converting with `engine`.
    pub fn new(accounts: LedgerAccounts, engine: RateEngine, store: S, access: A) -> Self {
        let params = *engine.params();
        Self::with_calculator(accounts, params, Box::new(engine), store, access)
    }

    /// Ledger converting with an arbitrary calculator. `params` must be the
    /// parameters the calculator was built with; they are used for resets.
    pub fn with_calculator(
        accounts: LedgerAccounts,
        params: DistributionParams,
        calculator: Box<dyn DistributionCalculator>,
        store: S,
        access: A,
    ) -> Self {
        Self {
            accounts,
            params,
            calculator,
            access,
            store: Mutex::new(store),
        }
    }

    pub fn accounts(&self) -> &LedgerAccounts {
        &self.accounts
    }

    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    /// Latest committed state.
    pub fn state(&self) -> Result<DistributionState, DiffractionError> {
        self.store.lock().load()
    }

    /// Preview `deposit` against the current state without committing.
    ///
    /// Ignores whether the ledger is accepting deposits.
    pub fn quote(&self, deposit: Amount<Eos>) -> Result<DepositOutcome, DiffractionError> {
        let state = self.state()?;
        Ok(self.calculator.quote(deposit, &state)?)
    }

    /// Handle a transfer notice.
    ///
    /// Notices that are not deposits into this ledger (sent by another
    /// contract, addressed elsewhere, or sent by the ledger itself) are
    /// ignored. Deposits are validated, converted, and committed together
    /// with their transfer instructions; an error means nothing was
    /// committed.
    pub fn on_transfer(&self, notice: &TransferNotice) -> Result<DepositDisposition, DiffractionError> {
        if !notice.is_deposit_to(&self.accounts.input_contract, &self.accounts.ledger) {
            debug!(
                contract = %notice.contract,
                from = %notice.from,
                to = %notice.to,
                "ignoring transfer that is not a deposit"
            );
            return Ok(DepositDisposition::Ignored);
        }

        let deposit = notice.validate().inspect_err(|e| {
            warn!(from = %notice.from, quantity = %notice.quantity, "rejected deposit notice: {e}");
        })?;

        self.deposit(&notice.from, deposit).map(DepositDisposition::Accepted)
    }

    /// Convert an already validated deposit from `depositor`.
    ///
    /// A deposit too small to buy one output unit is rejected: the issue
    /// transfer it would produce cannot be executed.
    pub fn deposit(
        &self,
        depositor: &AccountName,
        deposit: Amount<Eos>,
    ) -> Result<DepositReceipt, DiffractionError> {
        let mut store = self.store.lock();
        let state = store.load()?;

        let outcome = self
            .calculator
            .process_deposit(deposit, &state)
            .and_then(|outcome| {
                if outcome.issued.is_zero() {
                    Err(DistributionError::DepositTooSmall {
                        deposit: deposit.units(),
                    })
                } else {
                    Ok(outcome)
                }
            })
            .inspect_err(|e| {
                warn!(depositor = %depositor, deposit = %deposit, round = state.round, "deposit rejected: {e}");
            })?;

        let mut transfers = vec![TransferInstruction::issue(
            self.accounts.token_contract.clone(),
            depositor.clone(),
            outcome.issued,
        )];
        if !outcome.refund.is_zero() {
            transfers.push(TransferInstruction::refund(
                self.accounts.input_contract.clone(),
                depositor.clone(),
                outcome.refund,
            ));
        }

        store.commit(&outcome.next_state, &transfers).inspect_err(|e| {
            warn!(depositor = %depositor, deposit = %deposit, "commit failed, deposit rejected: {e}");
        })?;

        info!(
            depositor = %depositor,
            deposit = %deposit,
            issued = %outcome.issued,
            refund = %outcome.refund,
            round = outcome.next_state.round,
            rounds_crossed = outcome.rounds_crossed,
            "deposit converted"
        );
        if outcome.completed() {
            info!(
                total_issued = %outcome.next_state.total_issued,
                total_received = %outcome.next_state.total_received,
                "distribution completed"
            );
        }

        Ok(DepositReceipt {
            depositor: depositor.clone(),
            deposit,
            issued: outcome.issued,
            refund: outcome.refund,
            rounds_crossed: outcome.rounds_crossed,
            transfers,
            state: outcome.next_state,
        })
    }

    /// Open the ledger for deposits.
    pub fn activate(&self, caller: &AccountName) -> Result<DistributionState, DiffractionError> {
        self.administer(caller, "activate", |state, _| state.activate())
    }

    /// Close the ledger to deposits.
    pub fn deactivate(&self, caller: &AccountName) -> Result<DistributionState, DiffractionError> {
        self.administer(caller, "deactivate", |state, _| state.deactivate())
    }

    /// Reinitialize the ledger to its creation state.
    pub fn reset(&self, caller: &AccountName) -> Result<DistributionState, DiffractionError> {
        self.administer(caller, "reset", |state, params| state.reset(params))
    }

    /// Run `f` with shared access to the store.
    pub fn inspect<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&*self.store.lock())
    }

    /// Take the store back.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    fn administer(
        &self,
        caller: &AccountName,
        action: &'static str,
        apply: impl FnOnce(&mut DistributionState, &DistributionParams),
    ) -> Result<DistributionState, DiffractionError> {
        self.access.require_auth(caller).inspect_err(|e| {
            warn!(caller = %caller, action, "unauthorized: {e}");
        })?;

        let mut store = self.store.lock();
        let mut state = store.load()?;
        apply(&mut state, &self.params);
        store.commit(&state, &[])?;

        info!(caller = %caller, action, available = state.available, round = state.round, "ledger updated");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffraction_core::asset::{AssetKind, RawAsset};
    use diffraction_core::auth::SingleAuthority;
    use diffraction_core::constants::{LEVEL, SEND_LIMIT};
    use diffraction_core::error::{AuthError, ValidationError};
    use diffraction_core::state_store::MemoryStateStore;

    type TestLedger = Ledger<MemoryStateStore, SingleAuthority>;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn ledger_with(store: MemoryStateStore) -> TestLedger {
        let accounts = LedgerAccounts::default();
        let access = SingleAuthority::new(accounts.ledger.clone());
        Ledger::new(accounts, RateEngine::new(), store, access)
    }

    fn ledger() -> TestLedger {
        ledger_with(MemoryStateStore::new(&DistributionParams::default()))
    }

    fn open_ledger() -> TestLedger {
        let l = ledger();
        l.activate(&name("diffraction")).unwrap();
        l
    }

    fn notice(from: &str, quantity: &str) -> TransferNotice {
        TransferNotice {
            contract: name("eosio.token"),
            from: name(from),
            to: name("diffraction"),
            quantity: quantity.parse().unwrap(),
            memo: String::new(),
        }
    }

    fn sent(l: &TestLedger) -> Vec<TransferInstruction> {
        l.inspect(|store| store.outbox().to_vec())
    }

    fn commits(l: &TestLedger) -> u64 {
        l.inspect(|store| store.commit_count().unwrap())
    }

    // --- deposits ---

    #[test]
    fn deposit_issues_and_commits() {
        let l = open_ledger();
        let receipt = match l.on_transfer(&notice("alice", "0.1000 EOS")).unwrap() {
            DepositDisposition::Accepted(r) => r,
            other => panic!("expected accepted, got {other:?}"),
        };
        assert_eq!(receipt.issued.units(), 33_333);
        assert!(receipt.refund.is_zero());
        assert_eq!(receipt.transfers.len(), 1);
        assert_eq!(sent(&l), receipt.transfers);
        assert_eq!(l.state().unwrap(), receipt.state);
        assert_eq!(receipt.state.round_remain.units(), LEVEL - 33_333);
        assert_eq!(receipt.state.total_received.units(), 1_000);

        match &receipt.transfers[0] {
            TransferInstruction::Issue { contract, to, quantity, .. } => {
                assert_eq!(contract.as_str(), "athenastoken");
                assert_eq!(to.as_str(), "alice");
                assert_eq!(quantity.units(), 33_333);
            }
            other => panic!("expected issue, got {other:?}"),
        }
    }

    #[test]
    fn exhausting_deposit_refunds_and_closes() {
        let l = open_ledger();
        let receipt = l.deposit(&name("whale"), Amount::new(1_000_000_000_000)).unwrap();
        assert_eq!(receipt.state.total_issued.units(), SEND_LIMIT);
        assert!(!receipt.state.available);
        assert!(!receipt.refund.is_zero());

        let transfers = sent(&l);
        assert_eq!(transfers.len(), 2);
        match &transfers[1] {
            TransferInstruction::Refund { contract, quantity, .. } => {
                assert_eq!(contract.as_str(), "eosio.token");
                assert_eq!(*quantity, receipt.refund);
            }
            other => panic!("expected refund, got {other:?}"),
        }

        assert!(matches!(
            l.deposit(&name("late"), Amount::new(1)),
            Err(DiffractionError::Distribution(DistributionError::NotAvailable))
        ));
    }

    #[test]
    fn closed_ledger_rejects_without_commit() {
        let l = ledger();
        let before = l.state().unwrap();
        assert!(matches!(
            l.on_transfer(&notice("alice", "1.0000 EOS")),
            Err(DiffractionError::Distribution(DistributionError::NotAvailable))
        ));
        assert_eq!(l.state().unwrap(), before);
        assert!(sent(&l).is_empty());
        assert_eq!(commits(&l), 0);
    }

    #[test]
    fn deposits_see_previous_commit() {
        let l = open_ledger();
        l.deposit(&name("alice"), Amount::new(1_000)).unwrap();
        let second = l.deposit(&name("bob"), Amount::new(1_000)).unwrap();
        assert_eq!(second.state.total_issued.units(), 66_666);
        assert_eq!(second.state.total_received.units(), 2_000);
    }

    #[test]
    fn deposit_buying_nothing_is_rejected() {
        let p = DistributionParams::default();
        let last = p.final_round();
        let state = DistributionState {
            round: last,
            round_remain: Amount::new(p.round_capacity(last)),
            total_issued: Amount::new(SEND_LIMIT - p.round_capacity(last)),
            total_received: Amount::new(50),
            rate: p.rate_for_round(last),
            available: true,
        };
        let l = ledger_with(MemoryStateStore::with_state(state.clone()));

        // The final-round rate is below 1, so one minor unit buys nothing.
        assert_eq!(
            l.quote(Amount::new(1)).unwrap().issued,
            Amount::<Athena>::ZERO
        );
        assert!(matches!(
            l.on_transfer(&notice("dust", "0.0001 EOS")),
            Err(DiffractionError::Distribution(DistributionError::DepositTooSmall { deposit: 1 }))
        ));
        assert_eq!(l.state().unwrap(), state);
        assert_eq!(commits(&l), 0);
        assert!(sent(&l).is_empty());

        // Two units buy one.
        let r = l.deposit(&name("dust"), Amount::new(2)).unwrap();
        assert_eq!(r.issued.units(), 1);
    }

    // --- notices ---

    #[test]
    fn outgoing_and_foreign_transfers_are_ignored() {
        let l = open_ledger();
        let outgoing = TransferNotice {
            from: name("diffraction"),
            to: name("alice"),
            ..notice("alice", "1.0000 EOS")
        };
        let foreign = TransferNotice {
            to: name("bob"),
            ..notice("alice", "1.0000 EOS")
        };
        assert_eq!(l.on_transfer(&outgoing).unwrap(), DepositDisposition::Ignored);
        assert_eq!(l.on_transfer(&foreign).unwrap(), DepositDisposition::Ignored);
        assert!(sent(&l).is_empty());
        assert_eq!(l.state().unwrap().total_received, Amount::ZERO);
    }

    #[test]
    fn same_symbol_from_other_contract_is_ignored() {
        let l = open_ledger();
        let counterfeit = TransferNotice {
            contract: name("fake.token"),
            ..notice("alice", "1000.0000 EOS")
        };
        assert_eq!(l.on_transfer(&counterfeit).unwrap(), DepositDisposition::Ignored);
        assert!(sent(&l).is_empty());
        assert_eq!(commits(&l), 1);
        assert_eq!(l.state().unwrap().total_received, Amount::ZERO);
    }

    #[test]
    fn invalid_notices_are_rejected_before_state() {
        let l = open_ledger();
        let commits_before = commits(&l);

        let wrong = notice("alice", "1.0000 ATHENA");
        assert!(matches!(
            l.on_transfer(&wrong),
            Err(DiffractionError::Validation(ValidationError::WrongAsset { .. }))
        ));

        let negative = TransferNotice {
            quantity: RawAsset {
                amount: -5,
                symbol: Eos::symbol(),
            },
            ..notice("alice", "1.0000 EOS")
        };
        assert!(matches!(
            l.on_transfer(&negative),
            Err(DiffractionError::Validation(ValidationError::NonPositiveAmount))
        ));

        let chatty = TransferNotice {
            memo: "x".repeat(257),
            ..notice("alice", "1.0000 EOS")
        };
        assert!(matches!(
            l.on_transfer(&chatty),
            Err(DiffractionError::Validation(ValidationError::MemoTooLong { .. }))
        ));

        assert_eq!(commits(&l), commits_before);
        assert!(sent(&l).is_empty());
    }

    // --- administration ---

    #[test]
    fn only_ledger_account_administers() {
        let l = ledger();
        let err = l.activate(&name("mallory")).unwrap_err();
        assert!(matches!(err, DiffractionError::Auth(AuthError::MissingAuthority { .. })));
        assert!(!l.state().unwrap().available);
        assert_eq!(commits(&l), 0);

        assert!(l.activate(&name("diffraction")).unwrap().available);
        assert!(!l.deactivate(&name("diffraction")).unwrap().available);
        assert!(sent(&l).is_empty());
    }

    #[test]
    fn reset_restores_initial_state() {
        let l = open_ledger();
        l.deposit(&name("alice"), Amount::new(5_000_000_000)).unwrap();
        assert!(l.reset(&name("bob")).is_err());

        let state = l.reset(&name("diffraction")).unwrap();
        assert_eq!(state, DistributionState::initial(l.params()));
        assert_eq!(l.state().unwrap(), state);
    }

    #[test]
    fn activate_reopens_exhausted_ledger_but_deposits_fail() {
        let l = open_ledger();
        l.deposit(&name("whale"), Amount::new(1_000_000_000_000)).unwrap();
        l.activate(&name("diffraction")).unwrap();
        assert!(matches!(
            l.deposit(&name("late"), Amount::new(1)),
            Err(DiffractionError::Distribution(DistributionError::NotAvailable))
        ));
    }

    // --- quotes ---

    #[test]
    fn quote_does_not_commit() {
        let l = ledger();
        let q = l.quote(Amount::new(1_000)).unwrap();
        assert_eq!(q.issued.units(), 33_333);
        assert_eq!(commits(&l), 0);
        assert_eq!(l.state().unwrap(), DistributionState::initial(l.params()));
    }

    // --- atomic commit ---

    /// Store whose writes fail whenever the batch carries a refund.
    struct RefundFailingStore(MemoryStateStore);

    impl StateStore for RefundFailingStore {
        fn load(&self) -> Result<DistributionState, DiffractionError> {
            self.0.load()
        }

        fn commit(
            &mut self,
            state: &DistributionState,
            transfers: &[TransferInstruction],
        ) -> Result<(), DiffractionError> {
            if transfers.iter().any(|t| matches!(t, TransferInstruction::Refund { .. })) {
                return Err(DiffractionError::Storage("outbox write failed".into()));
            }
            self.0.commit(state, transfers)
        }

        fn commit_count(&self) -> Result<u64, DiffractionError> {
            self.0.commit_count()
        }
    }

    #[test]
    fn failed_refund_write_commits_nothing() {
        let accounts = LedgerAccounts::default();
        let engine = RateEngine::new();
        let mut state = DistributionState::initial(engine.params());
        state.activate();
        let store = RefundFailingStore(MemoryStateStore::with_state(state.clone()));
        let access = SingleAuthority::new(accounts.ledger.clone());
        let l = Ledger::new(accounts, engine, store, access);

        let err = l.deposit(&name("whale"), Amount::new(1_000_000_000_000)).unwrap_err();
        assert!(matches!(err, DiffractionError::Storage(_)));

        // Neither the exhausted state nor the issue leg is visible.
        assert_eq!(l.state().unwrap(), state);
        l.inspect(|store| {
            assert!(store.0.outbox().is_empty());
            assert_eq!(store.commit_count().unwrap(), 0);
        });

        // A deposit with no refund leg still goes through.
        let r = l.deposit(&name("alice"), Amount::new(1_000)).unwrap();
        assert_eq!(r.issued.units(), 33_333);
        assert_eq!(l.inspect(|store| store.0.outbox().len()), 1);
    }
}
