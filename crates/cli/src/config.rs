//! Configuration management for the custody CLI.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment variables.

use anyhow::{bail, Context, Result};
use custody_orchestrator::UnconfirmedPolicy;
use custody_types::{Network, DEFAULT_DUST_FLOOR, DEFAULT_LOCK_SET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "custody.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    pub network: Network,

    /// Hex-encoded operator BIP-32 seed.
    #[serde(skip_serializing)]
    pub operator_seed: String,

    /// SQLite database holding commitments and shares.
    pub db_path: PathBuf,

    /// Self-hosted mempool/Esplora API base, e.g. `http://localhost:8999/api`.
    pub indexer_url: Option<String>,

    /// Relative locks offered to depositors.
    pub locks: Vec<u32>,

    pub dust_floor: u64,

    pub unconfirmed: UnconfirmedConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnconfirmedConfig {
    /// `allow_all`, `allow_list` or `reject_all`.
    pub mode: String,
    pub allow_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            operator_seed: String::new(),
            db_path: PathBuf::from("custody.db"),
            indexer_url: None,
            locks: DEFAULT_LOCK_SET.to_vec(),
            dust_floor: DEFAULT_DUST_FLOOR,
            unconfirmed: UnconfirmedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for UnconfirmedConfig {
    fn default() -> Self {
        Self {
            mode: "allow_all".to_string(),
            allow_list: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl CustodyConfig {
    /// Load from `path` (or `custody.toml` if present), then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to load config file {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from environment variables resolved through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = var("CUSTODY_NETWORK") {
            self.network = network.parse().context("Invalid CUSTODY_NETWORK")?;
        }

        if let Some(seed) = var("OPERATOR_SEED") {
            self.operator_seed = seed;
        }

        if let Some(db_path) = var("CUSTODY_DB_PATH") {
            self.db_path = PathBuf::from(db_path);
        }

        if let Some(url) = var("INDEXER_URL") {
            self.indexer_url = Some(url).filter(|url| !url.is_empty());
        }

        if let Some(locks) = var("CUSTODY_LOCKS") {
            self.locks = locks
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse())
                .collect::<std::result::Result<_, _>>()
                .context("Invalid CUSTODY_LOCKS")?;
        }

        if let Some(floor) = var("DUST_FLOOR") {
            self.dust_floor = floor.parse().context("Invalid DUST_FLOOR")?;
        }

        if let Some(mode) = var("UNCONFIRMED_POLICY") {
            self.unconfirmed.mode = mode;
        }

        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.locks.is_empty() {
            bail!("At least one lock must be configured");
        }
        for lock in &self.locks {
            if !(1..=u16::MAX as u32).contains(lock) {
                bail!("Lock {} is outside 1..=65535 blocks", lock);
            }
        }
        let mut unique = self.locks.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != self.locks.len() {
            bail!("Duplicate locks in {:?}", self.locks);
        }

        if self.dust_floor == 0 {
            bail!("dust_floor must be positive");
        }
        self.unconfirmed_policy()?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            bail!(
                "Invalid log format '{}'. Must be 'text' or 'json'",
                self.logging.format
            );
        }
        Ok(())
    }

    pub fn unconfirmed_policy(&self) -> Result<UnconfirmedPolicy> {
        Ok(UnconfirmedPolicy::from_config(
            &self.unconfirmed.mode,
            &self.unconfirmed.allow_list,
        )?)
    }

    /// Operator seed, which most commands need.
    pub fn require_seed(&self) -> Result<&str> {
        if self.operator_seed.trim().is_empty() {
            bail!("Operator seed is not configured (set OPERATOR_SEED or operator_seed)");
        }
        Ok(&self.operator_seed)
    }
}
