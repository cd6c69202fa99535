//! Common test utilities for orchestrator integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_services;

pub use fixtures::*;
pub use mock_services::*;

use custody_bitcoin::{LocalSigner, ScriptFactory};
use custody_crypto::KeyPair;
use custody_orchestrator::{
    CommitmentEngine, DepositAccount, RecoveryEngine, SignatureShareEngine,
};
use custody_storage::{CommitmentStore, MemoryStore};
use custody_types::{Network, DEFAULT_LOCK_SET};
use std::sync::Arc;

/// Operator, depositor and the services wired to a shared store and indexer.
pub struct TestContext {
    pub store: Arc<dyn CommitmentStore>,
    pub indexer: Arc<MockIndexer>,
    pub operator: KeyPair,
    pub depositor: KeyPair,
    pub account: DepositAccount,
    pub commitments: CommitmentEngine,
    pub shares: SignatureShareEngine,
    pub recovery: RecoveryEngine,
}

impl TestContext {
    pub fn new(tip_height: u64) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), tip_height)
    }

    pub fn with_store(store: Arc<dyn CommitmentStore>, tip_height: u64) -> Self {
        let operator = operator_key();
        let depositor = depositor_key();
        let account = DepositAccount::new(
            &ScriptFactory::new().unwrap(),
            &operator.public_key(),
            &depositor.public_key(),
            &DEFAULT_LOCK_SET,
            Network::Testnet,
        )
        .unwrap();

        Self {
            indexer: Arc::new(MockIndexer::new(tip_height)),
            commitments: CommitmentEngine::new(store.clone()).unwrap(),
            shares: SignatureShareEngine::new(store.clone()),
            recovery: RecoveryEngine::new(store.clone()).unwrap(),
            store,
            operator,
            depositor,
            account,
        }
    }

    pub fn operator_signer(&self) -> LocalSigner {
        LocalSigner::new(self.operator.clone(), Network::Testnet)
    }

    pub fn depositor_signer(&self) -> LocalSigner {
        LocalSigner::new(self.depositor.clone(), Network::Testnet)
            .with_indexer(self.indexer.clone())
    }

    /// Fund the custody address of `lock_blocks` and return the deposit txid.
    pub async fn deposit(
        &self,
        seq: u64,
        value: u64,
        lock_blocks: u32,
        height: Option<u64>,
    ) -> String {
        let txid = deposit_txid(seq);
        let address = self
            .account
            .output_for_lock(lock_blocks)
            .expect("lock in default set")
            .address
            .clone();
        self.indexer
            .add_utxo(&address, esplora_utxo(&txid, 0, value, height))
            .await;
        txid
    }
}
