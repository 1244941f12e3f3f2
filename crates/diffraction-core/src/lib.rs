//! # diffraction-core
//! Foundation types and traits for the Diffraction ledger.

pub mod account;
pub mod asset;
pub mod auth;
pub mod constants;
pub mod error;
pub mod state;
pub mod state_store;
pub mod traits;
pub mod transfer;
