//! Scenario, adversarial, and end-to-end test suite for Diffraction.
//!
//! Integration tests drive the ledger the way a host does: transfer notices
//! in, transfer instructions out, state checked against the distribution
//! invariants after every event.

pub mod helpers;
