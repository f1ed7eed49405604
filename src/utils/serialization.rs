// Stable binary encoding for everything the ledger persists
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on bytes a single decode may claim. Length prefixes are checked
/// against it before anything is allocated.
pub const MAX_DECODE_BYTES: usize = 32 * 1024 * 1024;

fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_DECODE_BYTES>()
}

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(data, config())
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration.
/// Trailing bytes and oversized length prefixes are treated as corruption.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let (data, read) = bincode::decode_from_slice(bytes, config())
        .map_err(|e| LedgerError::MalformedData(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::MalformedData(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}
