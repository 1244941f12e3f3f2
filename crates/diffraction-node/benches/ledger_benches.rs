//! Criterion benchmarks for diffraction-node ledger operations.
//!
//! Covers: deposits through the in-memory ledger and through RocksDB.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

use diffraction_core::account::AccountName;
use diffraction_core::asset::Amount;
use diffraction_core::auth::SingleAuthority;
use diffraction_core::state_store::MemoryStateStore;
use diffraction_engine::RateEngine;
use diffraction_node_lib::{Ledger, LedgerAccounts, RocksStore};

fn bench_memory_deposit(c: &mut Criterion) {
    let accounts = LedgerAccounts::default();
    let admin = accounts.ledger.clone();
    let alice = AccountName::new("alice").unwrap();

    c.bench_function("ledger_deposit_memory", |b| {
        b.iter_batched(
            || {
                let engine = RateEngine::new();
                let store = MemoryStateStore::new(engine.params());
                let access = SingleAuthority::new(admin.clone());
                let l = Ledger::new(accounts.clone(), engine, store, access);
                l.activate(&admin).unwrap();
                l
            },
            |l| black_box(l.deposit(&alice, Amount::new(50_000_000)).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_rocks_deposit(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let accounts = LedgerAccounts::default();
    let admin = accounts.ledger.clone();
    let alice = AccountName::new("alice").unwrap();

    let engine = RateEngine::new();
    let store = RocksStore::open(dir.path(), engine.params()).unwrap();
    let access = SingleAuthority::new(admin.clone());
    let l = Ledger::new(accounts, engine, store, access);
    l.activate(&admin).unwrap();

    c.bench_function("ledger_deposit_rocksdb", |b| {
        b.iter(|| black_box(l.deposit(&alice, Amount::new(10_000)).unwrap()))
    });
}

criterion_group!(benches, bench_memory_deposit, bench_rocks_deposit);
criterion_main!(benches);
