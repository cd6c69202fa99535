//! Chain indexer client (mempool.space / Esplora compatible).
//!
//! Provides async access to:
//! - Address info and UTXOs
//! - Chain tip height
//! - Recommended fee rates
//! - Raw transactions and broadcasting

use crate::indexer::ChainIndexer;
use crate::types::{AddressInfo, RecommendedFees, Utxo};
use async_trait::async_trait;
use bitcoin::Address;
use custody_types::{CustodyError, FeeRates, Network, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Async client for the mempool.space REST API.
pub struct MempoolClient {
    network: Network,
    api_base: Option<String>,
    client: reqwest::Client,
}

impl MempoolClient {
    pub fn new(network: Network) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CustodyError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            network,
            api_base: None,
            client,
        })
    }

    /// Use a self-hosted instance instead of the public endpoint.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn url(&self, path: &str) -> String {
        match &self.api_base {
            Some(base) => format!("{}{}", base, path),
            None => self.network.endpoint(path),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            CustodyError::ExternalServiceFailure(format!("API request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CustodyError::ExternalServiceFailure(format!(
                "API error {}: {}",
                status, body
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path)
            .await?
            .json()
            .await
            .map_err(|e| CustodyError::Serialization(format!("Failed to parse response: {}", e)))
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        self.get(path)
            .await?
            .text()
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| CustodyError::ExternalServiceFailure(format!("Failed to read body: {}", e)))
    }

    /// Get transaction URL for the block explorer.
    pub fn tx_url(&self, txid: &str) -> String {
        format!("{}/tx/{}", self.network.explorer_url(), txid)
    }
}

/// Relay rejections are not retryable; annotate the common timelock case.
fn broadcast_rejection(body: &str) -> CustodyError {
    let mut message = body.trim().to_string();
    if message.contains("non-BIP68-final") {
        message.push_str(", timelock not passed");
    }
    CustodyError::InvalidTransaction(format!("Broadcast rejected: {}", message))
}

#[async_trait]
impl ChainIndexer for MempoolClient {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>> {
        self.get_json(&format!("/address/{}/utxo", address)).await
    }

    async fn get_address_info(&self, address: &Address) -> Result<AddressInfo> {
        let mut info: AddressInfo = self.get_json(&format!("/address/{}", address)).await?;
        info.address = address.to_string();
        Ok(info)
    }

    async fn get_tip_height(&self) -> Result<u64> {
        let text = self.get_text("/blocks/tip/height").await?;
        text.parse()
            .map_err(|e| CustodyError::Serialization(format!("Invalid tip height {:?}: {}", text, e)))
    }

    async fn get_recommended_fee_rates(&self) -> Result<FeeRates> {
        if let Some(rates) = self.network.fixed_fee_rates() {
            return Ok(rates);
        }
        let fees: RecommendedFees = self.get_json("/v1/fees/recommended").await?;
        Ok(fees.into())
    }

    async fn get_tx_hex(&self, txid: &str) -> Result<String> {
        self.get_text(&format!("/tx/{}/hex", txid)).await
    }

    async fn broadcast_raw(&self, tx_hex: &str) -> Result<String> {
        let url = self.url("/tx");
        let response = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| CustodyError::ExternalServiceFailure(format!("Broadcast failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            warn!("Broadcast rejected ({}): {}", status, body);
            return Err(broadcast_rejection(&body));
        }
        if !status.is_success() {
            return Err(CustodyError::ExternalServiceFailure(format!(
                "Broadcast error {}: {}",
                status, body
            )));
        }

        // Response is just the txid as plain text
        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = MempoolClient::new(Network::Signet).unwrap();
        assert_eq!(
            client.url("/blocks/tip/height"),
            "https://mempool.space/signet/api/blocks/tip/height"
        );

        let local = MempoolClient::new(Network::Testnet)
            .unwrap()
            .with_base_url("http://127.0.0.1:3002/api/");
        assert_eq!(local.url("/tx"), "http://127.0.0.1:3002/api/tx");
    }

    #[test]
    fn test_tx_url() {
        let client = MempoolClient::new(Network::Livenet).unwrap();
        assert_eq!(client.tx_url("abcd"), "https://mempool.space/tx/abcd");
    }

    #[test]
    fn test_timelock_rejection_is_annotated() {
        let err = broadcast_rejection("sendrawtransaction RPC error: non-BIP68-final");
        assert!(err.to_string().contains("timelock not passed"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_devnet_fee_rates_skip_network() {
        let client = MempoolClient::new(Network::Devnet).unwrap();
        let rates = client.get_recommended_fee_rates().await.unwrap();
        assert_eq!(rates, FeeRates::new(1, 1));
    }
}
