//! RocksDB store behaviour across reopen, exercised through the ledger.

use diffraction_core::account::AccountName;
use diffraction_core::asset::Amount;
use diffraction_core::auth::SingleAuthority;
use diffraction_core::constants::{DistributionParams, LEVEL};
use diffraction_core::error::{ConfigError, DiffractionError};
use diffraction_core::state::DistributionState;
use diffraction_core::state_store::StateStore;
use diffraction_core::transfer::TransferInstruction;
use diffraction_engine::RateEngine;
use diffraction_node_lib::{Ledger, LedgerAccounts, RocksStore};

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn open_ledger(path: &std::path::Path) -> Ledger<RocksStore, SingleAuthority> {
    let accounts = LedgerAccounts::default();
    let engine = RateEngine::new();
    let store = RocksStore::open(path, engine.params()).unwrap();
    let access = SingleAuthority::new(accounts.ledger.clone());
    Ledger::new(accounts, engine, store, access)
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let committed = {
        let l = open_ledger(dir.path());
        l.activate(&name("diffraction")).unwrap();
        let receipt = l.deposit(&name("alice"), Amount::new(1_000)).unwrap();
        l.inspect(|store| store.flush()).unwrap();
        receipt.state
    };

    let store = RocksStore::open(dir.path(), &DistributionParams::default()).unwrap();
    let state = store.load().unwrap();
    assert_eq!(state, committed);
    assert_eq!(state.round_remain.units(), LEVEL - 33_333);
    assert!(state.available);
    assert_eq!(store.commit_count().unwrap(), 2);
}

#[test]
fn rate_bits_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let p = DistributionParams::default();
    let mut state = DistributionState::initial(&p);
    state.round = 40;
    state.rate = p.rate_for_round(40);
    {
        let mut store = RocksStore::open(dir.path(), &p).unwrap();
        store.commit(&state, &[]).unwrap();
    }
    let store = RocksStore::open(dir.path(), &p).unwrap();
    assert_eq!(store.load().unwrap().rate.to_bits(), state.rate.to_bits());
}

#[test]
fn outbox_records_committed_transfers_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let l = open_ledger(dir.path());
    l.activate(&name("diffraction")).unwrap();
    l.deposit(&name("alice"), Amount::new(1_000)).unwrap();
    let whale = l.deposit(&name("whale"), Amount::new(1_000_000_000_000)).unwrap();

    let store = l.into_store();
    let outbox = store.outbox().unwrap();
    assert_eq!(outbox.len(), 3);
    assert_eq!(outbox.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(outbox[0].instruction.recipient().as_str(), "alice");
    assert!(matches!(outbox[1].instruction, TransferInstruction::Issue { .. }));
    match &outbox[2].instruction {
        TransferInstruction::Refund { quantity, to, .. } => {
            assert_eq!(*quantity, whale.refund);
            assert_eq!(to.as_str(), "whale");
        }
        other => panic!("expected refund, got {other:?}"),
    }
}

#[test]
fn clear_outbox_keeps_sequence_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RocksStore::open(dir.path(), &DistributionParams::default()).unwrap();
    let issue = TransferInstruction::issue(name("athenastoken"), name("alice"), Amount::new(5));

    let state = store.load().unwrap();
    store.commit(&state, &[issue.clone(), issue.clone()]).unwrap();
    assert_eq!(store.clear_outbox().unwrap(), 2);
    assert!(store.outbox().unwrap().is_empty());
    assert_eq!(store.clear_outbox().unwrap(), 0);

    store.commit(&state, &[issue]).unwrap();
    let outbox = store.outbox().unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].seq, 2);
}

#[test]
fn reopen_with_different_params_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    drop(RocksStore::open(dir.path(), &DistributionParams::default()).unwrap());

    let other = DistributionParams {
        level: 100,
        ..DistributionParams::default()
    };
    assert!(matches!(
        RocksStore::open(dir.path(), &other),
        Err(DiffractionError::Config(ConfigError::InvalidParams(_)))
    ));
}

#[test]
fn reset_persists() {
    let dir = tempfile::tempdir().unwrap();
    {
        let l = open_ledger(dir.path());
        l.activate(&name("diffraction")).unwrap();
        l.deposit(&name("alice"), Amount::new(200_000_000)).unwrap();
        l.reset(&name("diffraction")).unwrap();
    }
    let store = RocksStore::open(dir.path(), &DistributionParams::default()).unwrap();
    assert_eq!(store.load().unwrap(), DistributionState::initial(&DistributionParams::default()));
}

#[test]
fn rejected_deposit_leaves_no_outbox_rows() {
    let dir = tempfile::tempdir().unwrap();
    let l = open_ledger(dir.path());
    assert!(l.deposit(&name("alice"), Amount::new(1_000)).is_err());

    let store = l.into_store();
    assert!(store.outbox().unwrap().is_empty());
    assert_eq!(store.commit_count().unwrap(), 0);
    assert!(!store.load().unwrap().available);
}
