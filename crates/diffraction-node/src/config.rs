//! Host configuration for a Diffraction ledger.
//!
//! Provides [`NodeConfig`] with defaults for the data directory, deployment
//! accounts, and distribution parameters. [`NodeConfig::load`] layers an
//! optional TOML/JSON/YAML file and `DIFFRACTION_*` environment variables
//! over those defaults (`DIFFRACTION_PARAMS__LEVEL=...` for nested keys).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use diffraction_core::account::AccountName;
use diffraction_core::constants::{
    DEFAULT_INPUT_CONTRACT, DEFAULT_LEDGER_ACCOUNT, DEFAULT_TOKEN_CONTRACT, DistributionParams,
};
use diffraction_core::error::{ConfigError, DiffractionError};

use crate::ledger::LedgerAccounts;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DIFFRACTION";

/// Configuration for a ledger host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// The ledger's own account.
    pub ledger_account: AccountName,
    /// Contract issuing the output asset.
    pub token_contract: AccountName,
    /// Contract of the input asset.
    pub input_contract: AccountName,
    /// Distribution schedule.
    pub params: DistributionParams,
    /// Log level filter string (e.g. "info", "debug", "diffraction_node_lib=trace").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("diffraction");
        let accounts = LedgerAccounts::default();

        Self {
            data_dir,
            ledger_account: accounts.ledger,
            token_contract: accounts.token_contract,
            input_contract: accounts.input_contract,
            params: DistributionParams::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from defaults, then `file` (if given), then the
    /// environment. Distribution parameters are validated.
    pub fn load(file: Option<&Path>) -> Result<Self, DiffractionError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: NodeConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.params.validate()?;
        Ok(cfg)
    }

    /// Path to the RocksDB ledger data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Deployment accounts for the ledger.
    pub fn accounts(&self) -> LedgerAccounts {
        LedgerAccounts {
            ledger: self.ledger_account.clone(),
            token_contract: self.token_contract.clone(),
            input_contract: self.input_contract.clone(),
        }
    }
}
