//! Signing capability.
//!
//! One trait for every signing backend; callers never branch on which
//! wallet produced a signature.

use crate::indexer::ChainIndexer;
use crate::psbt::{finalize_input, sign_inputs};
use async_trait::async_trait;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Address, Transaction};
use custody_crypto::KeyPair;
use custody_types::{CustodyError, Network, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Which inputs to sign and whether to finalize them afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningSpec {
    pub inputs: Vec<usize>,
    pub auto_finalize: bool,
}

impl SigningSpec {
    /// Every input of `psbt`.
    pub fn all(psbt: &Psbt, auto_finalize: bool) -> Self {
        Self {
            inputs: (0..psbt.inputs.len()).collect(),
            auto_finalize,
        }
    }
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// Receiving addresses; the first one is the default destination.
    async fn accounts(&self) -> Result<Vec<String>>;

    async fn public_key(&self) -> Result<PublicKey>;

    async fn network(&self) -> Result<Network>;

    async fn sign_transaction(&self, psbt: Psbt, spec: &SigningSpec) -> Result<Psbt>;

    /// Broadcast a finalized transaction, returning its txid.
    async fn broadcast(&self, tx: &Transaction) -> Result<String>;
}

/// Signer backed by an in-process key.
pub struct LocalSigner {
    key: KeyPair,
    network: Network,
    indexer: Option<Arc<dyn ChainIndexer>>,
}

impl LocalSigner {
    pub fn new(key: KeyPair, network: Network) -> Self {
        Self {
            key,
            network,
            indexer: None,
        }
    }

    /// Route `broadcast` through `indexer`.
    pub fn with_indexer(mut self, indexer: Arc<dyn ChainIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn accounts(&self) -> Result<Vec<String>> {
        let secp = Secp256k1::verification_only();
        let address = Address::p2tr(
            &secp,
            self.key.x_only_public_key(),
            None,
            self.network.to_bitcoin_network(),
        );
        Ok(vec![address.to_string()])
    }

    async fn public_key(&self) -> Result<PublicKey> {
        Ok(self.key.public_key())
    }

    async fn network(&self) -> Result<Network> {
        Ok(self.network)
    }

    async fn sign_transaction(&self, mut psbt: Psbt, spec: &SigningSpec) -> Result<Psbt> {
        let added = sign_inputs(&mut psbt, &self.key, &spec.inputs)?;
        if added == 0 && !spec.inputs.is_empty() {
            return Err(CustodyError::InvalidTransaction(format!(
                "Key {} cannot sign any requested input",
                self.key.public_key()
            )));
        }
        if spec.auto_finalize {
            for index in &spec.inputs {
                finalize_input(&mut psbt, *index)?;
            }
        }
        debug!(
            "Local signer {} signed {} input(s) (finalize: {})",
            self.key.public_key(),
            added,
            spec.auto_finalize
        );
        Ok(psbt)
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<String> {
        let indexer = self.indexer.as_ref().ok_or_else(|| {
            CustodyError::ExternalServiceFailure("Local signer has no broadcaster".to_string())
        })?;
        let txid = indexer.broadcast_raw(&serialize_hex(tx)).await?;
        info!("Broadcast {}", txid);
        Ok(txid)
    }
}
