//! Chain indexer capability and deposit scanning.

use crate::script::CustodyOutput;
use crate::types::{AddressInfo, Utxo};
use async_trait::async_trait;
use bitcoin::Address;
use custody_types::{sort_deposits, Balance, DepositUtxo, FeeRates, Result};
use tracing::debug;

/// Read access to the chain plus transaction relay.
#[async_trait]
pub trait ChainIndexer: Send + Sync {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>>;

    async fn get_address_info(&self, address: &Address) -> Result<AddressInfo>;

    async fn get_tip_height(&self) -> Result<u64>;

    async fn get_recommended_fee_rates(&self) -> Result<FeeRates>;

    /// Raw transaction as hex.
    async fn get_tx_hex(&self, txid: &str) -> Result<String>;

    /// Relay a raw transaction (hex), returning its txid.
    async fn broadcast_raw(&self, tx_hex: &str) -> Result<String>;
}

/// All UTXOs on the given custody outputs, tagged with their lock and lock
/// status, in wallet display order.
pub async fn scan_deposits(
    indexer: &dyn ChainIndexer,
    outputs: &[CustodyOutput],
) -> Result<Vec<DepositUtxo>> {
    let tip = indexer.get_tip_height().await?;
    let mut deposits = Vec::new();
    for output in outputs {
        let utxos = indexer.get_utxos(&output.address).await?;
        debug!(
            "{} UTXO(s) on {} (lock {})",
            utxos.len(),
            output.address,
            output.lock_blocks
        );
        deposits.extend(
            utxos
                .into_iter()
                .map(|utxo| utxo.into_deposit(output.lock_blocks, tip)),
        );
    }
    sort_deposits(&mut deposits);
    Ok(deposits)
}

/// Balance summed over every custody output.
pub async fn protocol_balance(
    indexer: &dyn ChainIndexer,
    outputs: &[CustodyOutput],
) -> Result<Balance> {
    let mut balance = Balance::default();
    for output in outputs {
        let info = indexer.get_address_info(&output.address).await?;
        balance.add(info.confirmed_balance(), info.unconfirmed_balance());
    }
    Ok(balance)
}
