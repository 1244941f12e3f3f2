//! # diffraction-node
//! Ledger host: RocksDB storage, orchestration, configuration.
//!
//! Composes the Diffraction subsystems into a running ledger:
//! - [`storage::RocksStore`]: persistent state row and transfer outbox backed by RocksDB
//! - [`ledger::Ledger`]: validate, convert, and commit each deposit with its transfers
//! - [`config::NodeConfig`]: host configuration

pub mod config;
pub mod ledger;
pub mod storage;

pub use config::NodeConfig;
pub use ledger::{DepositDisposition, DepositReceipt, Ledger, LedgerAccounts};
pub use storage::{OutboxEntry, RocksStore};
