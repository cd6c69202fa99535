//! Bitcoin type definitions.
//!
//! Common types used across the Bitcoin integration, including:
//! - Indexer UTXO and address records (mempool.space / Esplora compatible)
//! - Spend inputs and unsigned transactions
//! - Fee check outcomes

use crate::script::CustodyOutput;
use bitcoin::psbt::Psbt;
use custody_types::{DepositUtxo, FeeRates};
use serde::{Deserialize, Serialize};

// ============================================================================
// Indexer Types
// ============================================================================

/// A UTXO as reported by the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64, // satoshis
    #[serde(default)]
    pub status: UtxoStatus,
}

/// Status of a UTXO (confirmed or in mempool).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UtxoStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

impl Utxo {
    /// Attach the lock of the custody address it was found on.
    pub fn into_deposit(self, lock_blocks: u32, tip_height: u64) -> DepositUtxo {
        let height = if self.status.confirmed {
            self.status.block_height
        } else {
            None
        };
        DepositUtxo::new(self.txid, self.vout, self.value, height, lock_blocks, tip_height)
    }
}

/// Address balance and transaction information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressInfo {
    #[serde(default)]
    pub address: String,
    pub chain_stats: ChainStats,
    pub mempool_stats: MempoolStats,
}

/// On-chain statistics for an address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChainStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

/// Mempool statistics for an address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MempoolStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

impl AddressInfo {
    /// Get confirmed balance in satoshis.
    pub fn confirmed_balance(&self) -> u64 {
        self.chain_stats
            .funded_txo_sum
            .saturating_sub(self.chain_stats.spent_txo_sum)
    }

    /// Get unconfirmed balance in satoshis.
    pub fn unconfirmed_balance(&self) -> i64 {
        (self.mempool_stats.funded_txo_sum as i64) - (self.mempool_stats.spent_txo_sum as i64)
    }
}

/// `/v1/fees/recommended` response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    #[serde(default)]
    pub fastest_fee: u64,
    #[serde(default)]
    pub half_hour_fee: u64,
    #[serde(default)]
    pub hour_fee: u64,
    #[serde(default)]
    pub economy_fee: u64,
    #[serde(default)]
    pub minimum_fee: u64,
}

impl From<RecommendedFees> for FeeRates {
    fn from(fees: RecommendedFees) -> Self {
        FeeRates::new(fees.minimum_fee, fees.fastest_fee)
    }
}

// ============================================================================
// Transaction Types
// ============================================================================

/// Which branch of the custody script a spend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPath {
    /// Operator and depositor sign; no time constraint.
    Cooperative,
    /// Depositor alone after the relative lock.
    Unilateral,
}

impl SpendPath {
    /// Signatures the custody leaf consumes on this path.
    pub fn signature_count(&self) -> usize {
        match self {
            SpendPath::Cooperative => 2,
            SpendPath::Unilateral => 1,
        }
    }
}

/// A deposit paired with the custody output it pays to.
#[derive(Debug, Clone)]
pub struct CustodyInput {
    pub utxo: DepositUtxo,
    pub output: CustodyOutput,
}

/// An unsigned spend ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedSpend {
    pub psbt: Psbt,
    pub path: SpendPath,
    /// Inputs spent.
    pub inputs: Vec<TxInput>,
    /// The single destination output.
    pub output: TxOutput,
    pub total_input_sats: u64,
    pub fee_sats: u64,
    pub estimated_vsize: u64,
}

/// Transaction input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    /// Script pubkey of the input (hex).
    pub script_pubkey: String,
}

/// Transaction output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
}

/// Outcome of checking the realized fee of a signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeeCheck {
    Sufficient {
        paid: u64,
        vsize: u64,
    },
    Insufficient {
        paid: u64,
        required: u64,
        recommended_fee: u64,
        vsize: u64,
    },
}

impl FeeCheck {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, FeeCheck::Sufficient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_calculation() {
        let info = AddressInfo {
            address: "tb1ptest".to_string(),
            chain_stats: ChainStats {
                funded_txo_sum: 100_000,
                spent_txo_sum: 30_000,
                ..Default::default()
            },
            mempool_stats: MempoolStats {
                funded_txo_sum: 5_000,
                spent_txo_sum: 0,
                ..Default::default()
            },
        };

        assert_eq!(info.confirmed_balance(), 70_000);
        assert_eq!(info.unconfirmed_balance(), 5_000);
    }

    #[test]
    fn test_recommended_fees_parse() {
        let json = r#"{"fastestFee":12,"halfHourFee":8,"hourFee":5,"economyFee":2,"minimumFee":1}"#;
        let fees: RecommendedFees = serde_json::from_str(json).unwrap();
        let rates = FeeRates::from(fees);
        assert_eq!(rates.minimum, 1);
        assert_eq!(rates.fastest, 12);
    }

    #[test]
    fn test_unconfirmed_utxo_ignores_height() {
        let utxo = Utxo {
            txid: "aa".repeat(32),
            vout: 1,
            value: 5_000,
            status: UtxoStatus {
                confirmed: false,
                block_height: Some(10),
            },
        };
        let deposit = utxo.into_deposit(1, 500);
        assert!(!deposit.confirmed);
        assert!(deposit.locked);
        assert_eq!(deposit.block_height, None);
    }
}
