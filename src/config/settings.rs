use crate::core::proof_of_work::MAX_DIFFICULTY;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = "data/ledger";
const DEFAULT_WALLET_FILE: &str = "wallet.dat";
const DEFAULT_CONFIG_FILE: &str = "ledger.toml";
pub const DEFAULT_DIFFICULTY: u32 = 10;

const CONFIG_FILE_KEY: &str = "LEDGER_CONFIG";
const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const WALLET_FILE_KEY: &str = "LEDGER_WALLET_FILE";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";

/// Where the ledger and wallet file live and how hard blocks are to seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub wallet_path: PathBuf,
    pub difficulty: u32,
}

/// Optional keys accepted in `ledger.toml`
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    db_path: Option<PathBuf>,
    wallet_file: Option<PathBuf>,
    difficulty: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            wallet_path: PathBuf::from(DEFAULT_WALLET_FILE),
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file named by `LEDGER_CONFIG` (or
    /// `./ledger.toml` if present), then individual environment overrides.
    pub fn load() -> Result<Config> {
        let mut config = Config::default();

        match env::var(CONFIG_FILE_KEY) {
            Ok(path) => config.merge_file(Path::new(&path))?,
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    config.merge_file(path)?;
                }
            }
        }

        if let Ok(path) = env::var(DB_PATH_KEY) {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var(WALLET_FILE_KEY) {
            config.wallet_path = PathBuf::from(path);
        }
        if let Ok(difficulty) = env::var(DIFFICULTY_KEY) {
            config.difficulty = difficulty.parse().map_err(|e| {
                LedgerError::Config(format!("Invalid {DIFFICULTY_KEY} {difficulty}: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// A config rooted in `dir`, used for throwaway ledgers
    pub fn in_dir(dir: &Path, difficulty: u32) -> Config {
        Config {
            db_path: dir.join(DEFAULT_DB_PATH),
            wallet_path: dir.join(DEFAULT_WALLET_FILE),
            difficulty,
        }
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        self.merge_toml(&contents)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))
    }

    fn merge_toml(&mut self, contents: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(contents)
            .map_err(|e| LedgerError::Config(format!("Invalid config file: {e}")))?;
        if let Some(db_path) = file.db_path {
            self.db_path = db_path;
        }
        if let Some(wallet_file) = file.wallet_file {
            self.wallet_path = wallet_file;
        }
        if let Some(difficulty) = file.difficulty {
            self.difficulty = difficulty;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty >= MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty {} must be below {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.wallet_path, PathBuf::from(DEFAULT_WALLET_FILE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_toml_overrides_given_keys_only() {
        let mut config = Config::default();
        config
            .merge_toml("db_path = \"/tmp/chain\"\ndifficulty = 4\n")
            .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/chain"));
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.wallet_path, PathBuf::from(DEFAULT_WALLET_FILE));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let mut config = Config::default();
        assert!(matches!(
            config.merge_toml("difficulty = \"hard\""),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_difficulty_bound() {
        let mut config = Config::default();
        config.difficulty = 256;
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }
}
