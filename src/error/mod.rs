//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`Result`]. Decode failures,
//! missing references and bad signatures are reported as values so the caller
//! decides what to do; nothing on these paths aborts the process.

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Ledger already exists / does not exist, or a bad configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    /// Block, transaction or wallet bytes could not be decoded
    #[error("Malformed data: {0}")]
    MalformedData(String),
    /// Transfer amount exceeds the discoverable unspent outputs
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },
    /// An input references a transaction id absent from the ledger
    #[error("Unresolved reference: transaction {0} not found")]
    UnresolvedReference(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// Checksum, length or base58 mismatch
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    #[error("Transaction error: {0}")]
    Transaction(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    /// Proof-of-work search was aborted
    #[error("Mining error: {0}")]
    Mining(String),
    #[error("Wallet error: {0}")]
    Wallet(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::MalformedData(err.to_string())
    }
}
