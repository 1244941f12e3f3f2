//! Error types for the Diffraction ledger.
use thiserror::Error;

/// A deposit notice was malformed. Raised before any state is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("wrong asset: expected {expected}, got {got}")] WrongAsset { expected: String, got: String },
    #[error("invalid quantity: {0}")] InvalidAmount(i64),
    #[error("quantity must be positive")] NonPositiveAmount,
    #[error("memo has {len} bytes, limit is {max}")] MemoTooLong { len: usize, max: usize },
    #[error("invalid account name: {0:?}")] InvalidAccountName(String),
    #[error("malformed asset string: {0:?}")] MalformedAsset(String),
}

/// A deposit could not be converted. Nothing is committed when this is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("distribution not yet started or has ended")] NotAvailable,
    #[error("the amount to be sent exceeds the upper limit")] Overflow,
    #[error("deposit of {deposit} buys no output at the current rate")] DepositTooSmall { deposit: u64 },
    #[error("refund {refund} must be less than the received {deposit}")] RefundInvariantViolation { refund: u64, deposit: u64 },
    #[error("invalid distribution state: {0}")] InvalidState(String),
    #[error(transparent)] Validation(#[from] ValidationError),
}

/// Caller lacks the authority an administrative operation requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authority of {required}, caller is {caller}")] MissingAuthority { caller: String, required: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid distribution parameters: {0}")] InvalidParams(String),
    #[error("config load: {0}")] Load(String),
}

#[derive(Error, Debug)]
pub enum DiffractionError {
    #[error(transparent)] Distribution(#[from] DistributionError),
    #[error(transparent)] Validation(#[from] ValidationError),
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("storage: {0}")] Storage(String),
}
