//! Distribution state storage interface and in-memory implementation.
//!
//! Provides the [`StateStore`] trait for the single persisted
//! [`DistributionState`] row and the outbox of transfer instructions each
//! transition produces. The [`MemoryStateStore`] is suitable for testing;
//! the production host uses RocksDB (diffraction-node).
//!
//! Stores never validate what they are given: callers commit only states
//! produced by a successful engine transition or an administrative toggle.

use crate::constants::DistributionParams;
use crate::error::DiffractionError;
use crate::state::DistributionState;
use crate::transfer::TransferInstruction;

/// Single-row state storage with a transfer outbox.
///
/// Implementations create the initial row when none exists, so
/// [`load`](StateStore::load) always returns a state.
///
/// Not thread-safe; callers must serialise load/commit sequences (the
/// ledger holds a mutex across each one).
pub trait StateStore: Send + Sync {
    /// Latest committed state.
    fn load(&self) -> Result<DistributionState, DiffractionError>;

    /// Replace the stored state and append `transfers` to the outbox as one
    /// atomic write. On error neither is visible.
    fn commit(
        &mut self,
        state: &DistributionState,
        transfers: &[TransferInstruction],
    ) -> Result<(), DiffractionError>;

    /// Number of commits applied. Defaults to 0 for stores that do not
    /// track it.
    fn commit_count(&self) -> Result<u64, DiffractionError> {
        Ok(0)
    }
}

/// In-memory state storage for testing.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    state: DistributionState,
    outbox: Vec<TransferInstruction>,
    commits: u64,
}

impl MemoryStateStore {
    /// Store holding the initial state for `params`.
    pub fn new(params: &DistributionParams) -> Self {
        Self::with_state(DistributionState::initial(params))
    }

    /// Store seeded with an arbitrary state.
    pub fn with_state(state: DistributionState) -> Self {
        Self {
            state,
            outbox: Vec::new(),
            commits: 0,
        }
    }

    /// Every instruction committed so far, oldest first.
    pub fn outbox(&self) -> &[TransferInstruction] {
        &self.outbox
    }

    /// Drain the outbox.
    pub fn take_outbox(&mut self) -> Vec<TransferInstruction> {
        std::mem::take(&mut self.outbox)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<DistributionState, DiffractionError> {
        Ok(self.state.clone())
    }

    fn commit(
        &mut self,
        state: &DistributionState,
        transfers: &[TransferInstruction],
    ) -> Result<(), DiffractionError> {
        self.state = state.clone();
        self.outbox.extend_from_slice(transfers);
        self.commits += 1;
        Ok(())
    }

    fn commit_count(&self) -> Result<u64, DiffractionError> {
        Ok(self.commits)
    }
}
