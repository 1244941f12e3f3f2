//! RocksDB-backed persistent ledger storage.
//!
//! Implements [`StateStore`] over RocksDB column families for the state row,
//! the transfer outbox, and metadata. Every mutation is a single
//! [`WriteBatch`]: a commit writes the state row, its outbox rows, and the
//! counters together.
//!
//! On first open, writes the initial state row and records the distribution
//! parameters; reopening with different parameters is refused.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;

use diffraction_core::account::AccountName;
use diffraction_core::asset::Amount;
use diffraction_core::constants::DistributionParams;
use diffraction_core::error::{ConfigError, DiffractionError};
use diffraction_core::state::DistributionState;
use diffraction_core::state_store::StateStore;
use diffraction_core::transfer::TransferInstruction;

// --- Column family names ---

const CF_STATE: &str = "state";
const CF_OUTBOX: &str = "outbox";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[CF_STATE, CF_OUTBOX, CF_METADATA];

// --- Keys ---

const STATE_KEY: &[u8] = b"state";
const META_PARAMS: &[u8] = b"params";
const META_NEXT_OUTBOX_SEQ: &[u8] = b"next_outbox_seq";
const META_COMMIT_COUNT: &[u8] = b"commit_count";

#[derive(bincode::Encode, bincode::Decode)]
struct StateRow {
    round: u32,
    round_remain: u64,
    total_issued: u64,
    total_received: u64,
    rate: f64,
    available: bool,
}

impl From<&DistributionState> for StateRow {
    fn from(s: &DistributionState) -> Self {
        Self {
            round: s.round,
            round_remain: s.round_remain.units(),
            total_issued: s.total_issued.units(),
            total_received: s.total_received.units(),
            rate: s.rate,
            available: s.available,
        }
    }
}

impl From<StateRow> for DistributionState {
    fn from(r: StateRow) -> Self {
        Self {
            round: r.round,
            round_remain: Amount::new(r.round_remain),
            total_issued: Amount::new(r.total_issued),
            total_received: Amount::new(r.total_received),
            rate: r.rate,
            available: r.available,
        }
    }
}

#[derive(bincode::Encode, bincode::Decode, PartialEq)]
struct ParamsRow {
    level: u64,
    rate_decay: f64,
    send_limit: u64,
    init_rate: f64,
}

impl From<&DistributionParams> for ParamsRow {
    fn from(p: &DistributionParams) -> Self {
        Self {
            level: p.level,
            rate_decay: p.rate_decay,
            send_limit: p.send_limit,
            init_rate: p.init_rate,
        }
    }
}

/// Outbox row. `refund` selects the instruction variant.
#[derive(bincode::Encode, bincode::Decode)]
struct OutboxRow {
    queued_at: i64,
    refund: bool,
    contract: String,
    to: String,
    units: u64,
}

impl OutboxRow {
    fn new(instruction: &TransferInstruction, queued_at: DateTime<Utc>) -> Self {
        let (refund, units) = match instruction {
            TransferInstruction::Issue { quantity, .. } => (false, quantity.units()),
            TransferInstruction::Refund { quantity, .. } => (true, quantity.units()),
        };
        Self {
            queued_at: queued_at.timestamp(),
            refund,
            contract: instruction.contract().to_string(),
            to: instruction.recipient().to_string(),
            units,
        }
    }

    fn into_entry(self, seq: u64) -> Result<OutboxEntry, DiffractionError> {
        let contract = AccountName::new(self.contract)?;
        let to = AccountName::new(self.to)?;
        let instruction = if self.refund {
            TransferInstruction::refund(contract, to, Amount::new(self.units))
        } else {
            TransferInstruction::issue(contract, to, Amount::new(self.units))
        };
        let queued_at = DateTime::from_timestamp(self.queued_at, 0)
            .ok_or_else(|| DiffractionError::Storage(format!("invalid outbox timestamp {}", self.queued_at)))?;
        Ok(OutboxEntry {
            seq,
            queued_at,
            instruction,
        })
    }
}

/// A transfer instruction waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxEntry {
    pub seq: u64,
    pub queued_at: DateTime<Utc>,
    pub instruction: TransferInstruction,
}

/// RocksDB-backed ledger storage.
///
/// Cloning shares the underlying database; a host may keep a handle to read
/// and drain the outbox while the ledger owns another.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist. A fresh database gets
    /// the initial state for `params`; an existing one must have been created
    /// with the same `params`.
    pub fn open(path: impl AsRef<Path>, params: &DistributionParams) -> Result<Self, DiffractionError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(storage_err)?;
        let store = Self { db: Arc::new(db) };

        match store.get_params()? {
            Some(stored) if stored == ParamsRow::from(params) => {}
            Some(_) => {
                return Err(ConfigError::InvalidParams(
                    "database was created with different distribution parameters".into(),
                )
                .into());
            }
            None => store.initialize(params)?,
        }

        Ok(store)
    }

    /// All queued transfer instructions, oldest first.
    pub fn outbox(&self) -> Result<Vec<OutboxEntry>, DiffractionError> {
        let cf = self.cf_handle(CF_OUTBOX)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(storage_err)?;
            let seq = u64::from_be_bytes(
                key[..]
                    .try_into()
                    .map_err(|_| DiffractionError::Storage("invalid outbox key length".into()))?,
            );
            let row: OutboxRow = decode(&value)?;
            entries.push(row.into_entry(seq)?);
        }
        Ok(entries)
    }

    /// Remove every queued instruction. Returns how many were removed.
    pub fn clear_outbox(&self) -> Result<usize, DiffractionError> {
        let cf = self.cf_handle(CF_OUTBOX)?;
        let mut batch = WriteBatch::default();
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(storage_err)?;
            batch.delete_cf(cf, key);
            count += 1;
        }
        if count > 0 {
            self.db.write(batch).map_err(storage_err)?;
            tracing::info!("cleared {} outbox entries", count);
        }
        Ok(count)
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), DiffractionError> {
        self.db.flush().map_err(storage_err)
    }

    // --- Internal helpers ---

    fn initialize(&self, params: &DistributionParams) -> Result<(), DiffractionError> {
        let cf_state = self.cf_handle(CF_STATE)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf_meta, META_PARAMS, encode(&ParamsRow::from(params))?);
        if self.db.get_cf(cf_state, STATE_KEY).map_err(storage_err)?.is_none() {
            let initial = DistributionState::initial(params);
            batch.put_cf(cf_state, STATE_KEY, encode(&StateRow::from(&initial))?);
        }
        self.db.write(batch).map_err(storage_err)?;
        tracing::info!(level = params.level, send_limit = params.send_limit, "initialized ledger storage");
        Ok(())
    }

    fn get_params(&self) -> Result<Option<ParamsRow>, DiffractionError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, META_PARAMS).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a u64 from the metadata column family.
    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, DiffractionError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| DiffractionError::Storage("invalid metadata value length".into()))?;
                Ok(u64::from_le_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, DiffractionError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DiffractionError::Storage(format!("missing column family: {name}")))
    }
}

impl StateStore for RocksStore {
    fn load(&self) -> Result<DistributionState, DiffractionError> {
        let cf = self.cf_handle(CF_STATE)?;
        let bytes = self
            .db
            .get_cf(cf, STATE_KEY)
            .map_err(storage_err)?
            .ok_or_else(|| DiffractionError::Storage("state row missing".into()))?;
        let row: StateRow = decode(&bytes)?;
        Ok(row.into())
    }

    /// Writes the state row, one outbox row per instruction, and both
    /// counters in a single batch.
    fn commit(
        &mut self,
        state: &DistributionState,
        transfers: &[TransferInstruction],
    ) -> Result<(), DiffractionError> {
        let cf_state = self.cf_handle(CF_STATE)?;
        let cf_outbox = self.cf_handle(CF_OUTBOX)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let commits = self.get_meta_u64(META_COMMIT_COUNT)?;
        let mut seq = self.get_meta_u64(META_NEXT_OUTBOX_SEQ)?;
        let queued_at = Utc::now();

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_state, STATE_KEY, encode(&StateRow::from(state))?);
        for instruction in transfers {
            batch.put_cf(cf_outbox, seq.to_be_bytes(), encode(&OutboxRow::new(instruction, queued_at))?);
            seq += 1;
        }
        batch.put_cf(cf_meta, META_NEXT_OUTBOX_SEQ, seq.to_le_bytes());
        batch.put_cf(cf_meta, META_COMMIT_COUNT, (commits + 1).to_le_bytes());
        self.db.write(batch).map_err(storage_err)
    }

    fn commit_count(&self) -> Result<u64, DiffractionError> {
        self.get_meta_u64(META_COMMIT_COUNT)
    }
}

fn storage_err(e: rocksdb::Error) -> DiffractionError {
    DiffractionError::Storage(e.to_string())
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, DiffractionError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(|e| DiffractionError::Storage(e.to_string()))
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, DiffractionError> {
    let (value, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| DiffractionError::Storage(e.to_string()))?;
    Ok(value)
}
