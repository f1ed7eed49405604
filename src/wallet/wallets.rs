use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::info;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";

/// Key pairs persisted in a single wallet file, keyed by address
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
    path: PathBuf,
}

impl Wallets {
    /// Loads the wallet file at `path`; a missing file yields an empty set
    pub fn load(path: &Path) -> Result<Wallets> {
        let mut wallets = Wallets {
            wallets: BTreeMap::new(),
            path: path.to_path_buf(),
        };
        if path.exists() {
            let bytes = fs::read(path)?;
            wallets.wallets = deserialize(&bytes).map_err(|e| {
                LedgerError::MalformedData(format!(
                    "Wallet file {} is corrupt: {e}",
                    path.display()
                ))
            })?;
        }
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save()?;
        info!("Created wallet {address}");
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes = serialize(&self.wallets)?;
        writer.write_all(wallets_bytes.as_slice())?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| LedgerError::Io(e.to_string()))
            .and_then(|f: File| f.sync_all().map_err(LedgerError::from))
    }
}
