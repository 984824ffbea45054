use crate::error::{LedgerError, Result};
use crate::wallet::Curve;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_DIFFICULTY: u32 = 2;
const DEFAULT_MAX_TRANSACTIONS_PER_BLOCK: usize = 100;
const DEFAULT_BLOCK_REWARD: u64 = 100;
const DEFAULT_COMMIT_RETRIES: u32 = 3;

// A SHA-256 hex digest has 64 characters
const MAX_DIFFICULTY: u32 = 64;

const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const CURVE_KEY: &str = "LEDGER_CURVE";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const MAX_TX_PER_BLOCK_KEY: &str = "LEDGER_MAX_TX_PER_BLOCK";
const BLOCK_REWARD_KEY: &str = "LEDGER_BLOCK_REWARD";

/// Parameters of the block sealer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub difficulty: u32,
    pub max_transactions_per_block: usize,
    pub block_reward: u64,
    /// Wall-clock budget for one proof-of-work search
    pub timeout_ms: Option<u64>,
    /// Nonce budget for one proof-of-work search
    pub max_iterations: Option<u64>,
    /// How often a seal that lost a settlement race is retried
    pub commit_retries: u32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            difficulty: DEFAULT_DIFFICULTY,
            max_transactions_per_block: DEFAULT_MAX_TRANSACTIONS_PER_BLOCK,
            block_reward: DEFAULT_BLOCK_REWARD,
            timeout_ms: None,
            max_iterations: None,
            commit_retries: DEFAULT_COMMIT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub curve: Curve,
    pub mining: MiningConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            curve: Curve::default(),
            mining: MiningConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Defaults, then the optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<LedgerConfig> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => LedgerConfig::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<LedgerConfig> {
        let raw = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<LedgerConfig> {
        Ok(toml::from_str(raw)?)
    }

    /// Config rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> LedgerConfig {
        LedgerConfig {
            data_dir: data_dir.into(),
            ..LedgerConfig::default()
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(curve) = env::var(CURVE_KEY) {
            self.curve = curve.parse()?;
        }
        if let Some(difficulty) = parse_env(DIFFICULTY_KEY)? {
            self.mining.difficulty = difficulty;
        }
        if let Some(max) = parse_env(MAX_TX_PER_BLOCK_KEY)? {
            self.mining.max_transactions_per_block = max;
        }
        if let Some(reward) = parse_env(BLOCK_REWARD_KEY)? {
            self.mining.block_reward = reward;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining.max_transactions_per_block == 0 {
            return Err(LedgerError::Config(
                "max_transactions_per_block must be positive".to_string(),
            ));
        }
        if self.mining.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the {MAX_DIFFICULTY} hex digits of a SHA-256 hash",
                self.mining.difficulty
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| LedgerError::Config(format!("{key} has an invalid value: {value}"))),
        Err(_) => Ok(None),
    }
}
