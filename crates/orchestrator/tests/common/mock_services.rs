//! Mock chain indexer for integration tests.

use async_trait::async_trait;
use bitcoin::consensus::encode::deserialize_hex;
use bitcoin::{Address, Transaction};
use custody_bitcoin::{AddressInfo, ChainIndexer, ChainStats, MempoolStats, Utxo};
use custody_types::{CustodyError, FeeRates, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    tip_height: u64,
    fee_rates: FeeRates,
    utxos: HashMap<String, Vec<Utxo>>,
    transactions: HashMap<String, String>,
    broadcasts: Vec<Transaction>,
    reject_with: Option<String>,
}

/// In-memory indexer recording every broadcast.
pub struct MockIndexer {
    state: Mutex<State>,
}

impl MockIndexer {
    pub fn new(tip_height: u64) -> Self {
        Self {
            state: Mutex::new(State {
                tip_height,
                fee_rates: FeeRates::new(2, 5),
                ..State::default()
            }),
        }
    }

    pub async fn set_tip(&self, tip_height: u64) {
        self.state.lock().await.tip_height = tip_height;
    }

    pub async fn set_fee_rates(&self, fee_rates: FeeRates) {
        self.state.lock().await.fee_rates = fee_rates;
    }

    pub async fn add_utxo(&self, address: &Address, utxo: Utxo) {
        self.state
            .lock()
            .await
            .utxos
            .entry(address.to_string())
            .or_default()
            .push(utxo);
    }

    /// Make every broadcast fail with `message` as the relay's reason.
    pub async fn reject_broadcasts(&self, message: &str) {
        self.state.lock().await.reject_with = Some(message.to_string());
    }

    pub async fn broadcasts(&self) -> Vec<Transaction> {
        self.state.lock().await.broadcasts.clone()
    }
}

#[async_trait]
impl ChainIndexer for MockIndexer {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>> {
        Ok(self
            .state
            .lock()
            .await
            .utxos
            .get(&address.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_address_info(&self, address: &Address) -> Result<AddressInfo> {
        let utxos = self.get_utxos(address).await?;
        let mut chain_stats = ChainStats::default();
        let mut mempool_stats = MempoolStats::default();
        for utxo in &utxos {
            if utxo.status.confirmed {
                chain_stats.funded_txo_count += 1;
                chain_stats.funded_txo_sum += utxo.value;
            } else {
                mempool_stats.funded_txo_count += 1;
                mempool_stats.funded_txo_sum += utxo.value;
            }
        }
        Ok(AddressInfo {
            address: address.to_string(),
            chain_stats,
            mempool_stats,
        })
    }

    async fn get_tip_height(&self) -> Result<u64> {
        Ok(self.state.lock().await.tip_height)
    }

    async fn get_recommended_fee_rates(&self) -> Result<FeeRates> {
        Ok(self.state.lock().await.fee_rates)
    }

    async fn get_tx_hex(&self, txid: &str) -> Result<String> {
        self.state
            .lock()
            .await
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| CustodyError::ExternalServiceFailure(format!("API error 404: {}", txid)))
    }

    async fn broadcast_raw(&self, tx_hex: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.reject_with {
            return Err(CustodyError::InvalidTransaction(format!(
                "Broadcast rejected: {}",
                reason
            )));
        }
        let tx: Transaction = deserialize_hex(tx_hex)
            .map_err(|e| CustodyError::InvalidTransaction(format!("Undecodable tx: {}", e)))?;
        let txid = tx.compute_txid().to_string();
        state.transactions.insert(txid.clone(), tx_hex.to_string());
        state.broadcasts.push(tx);
        Ok(txid)
    }
}
