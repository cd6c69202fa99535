//! Command implementations.

pub mod account;
pub mod commitments;
pub mod shares;
pub mod slash;
pub mod withdraw;

use crate::config::CustodyConfig;
use anyhow::{Context, Result};
use bitcoin::secp256k1::PublicKey;
use bitcoin::{Address, CompressedPublicKey};
use custody_bitcoin::{ChainIndexer, LocalSigner, MempoolClient, ScriptFactory};
use custody_crypto::{parse_public_key, KeyPair, KeyRole, OperatorKeyring};
use custody_orchestrator::DepositAccount;
use custody_storage::{CommitmentStore, SqliteStore};
use custody_types::Network;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Shared handles for one CLI invocation.
pub struct AppContext {
    pub config: CustodyConfig,
    store: Arc<dyn CommitmentStore>,
    indexer: Arc<MempoolClient>,
}

impl AppContext {
    pub fn new(config: CustodyConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path).with_context(|| {
            format!("Failed to open commitment store {}", config.db_path.display())
        })?;

        let mut indexer =
            MempoolClient::new(config.network).context("Failed to create indexer client")?;
        if let Some(url) = &config.indexer_url {
            indexer = indexer.with_base_url(url.clone());
        }
        debug!(
            "Commitment store at {} on {}",
            config.db_path.display(),
            config.network
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            indexer: Arc::new(indexer),
        })
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn store(&self) -> Arc<dyn CommitmentStore> {
        self.store.clone()
    }

    pub fn indexer(&self) -> Arc<dyn ChainIndexer> {
        self.indexer.clone()
    }

    pub fn keyring(&self) -> Result<OperatorKeyring> {
        Ok(OperatorKeyring::from_seed_hex(
            self.config.require_seed()?,
            self.network(),
        )?)
    }

    pub fn operator_key(&self) -> Result<KeyPair> {
        Ok(self.keyring()?.co_signer()?)
    }

    /// Operator signer broadcasting through the configured indexer.
    pub fn operator_signer(&self) -> Result<LocalSigner> {
        Ok(LocalSigner::new(self.operator_key()?, self.network()).with_indexer(self.indexer()))
    }

    /// P2WPKH address of the operator's penalty key.
    pub fn penalty_sink(&self) -> Result<Address> {
        let key = self.keyring()?.key(KeyRole::PenaltySink)?;
        Ok(Address::p2wpkh(
            &CompressedPublicKey(key.public_key()),
            self.network().to_bitcoin_network(),
        ))
    }

    pub fn account(&self, depositor: &PublicKey) -> Result<DepositAccount> {
        let factory = ScriptFactory::new()?;
        let operator = self.operator_key()?.public_key();
        Ok(DepositAccount::new(
            &factory,
            &operator,
            depositor,
            &self.config.locks,
            self.network(),
        )?)
    }
}

/// Accepts `7`, `07` as decimal or `0x07` as hex.
pub fn parse_nonce(value: &str) -> Result<u8> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .with_context(|| format!("Invalid nonce '{}': expected 0-255 or 0x00-0xff", value))
}

pub fn parse_address(value: &str, network: Network) -> Result<Address> {
    Address::from_str(value)
        .with_context(|| format!("Invalid address '{}'", value))?
        .require_network(network.to_bitcoin_network())
        .with_context(|| format!("Address '{}' is not valid on {}", value, network))
}

pub fn parse_depositor(value: &str) -> Result<PublicKey> {
    parse_public_key(value).with_context(|| format!("Invalid depositor public key '{}'", value))
}
