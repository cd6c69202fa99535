//! Bitcoin integration for the accountable custody engine.

pub mod client;
pub mod indexer;
pub mod psbt;
pub mod script;
pub mod signer;
pub mod tx_builder;
pub mod types;

pub use client::MempoolClient;
pub use indexer::{protocol_balance, scan_deposits, ChainIndexer};
pub use psbt::{
    extract_transaction, finalize_all, finalize_input, is_finalized, projected_vsize,
    psbt_fee, psbt_from_hex, psbt_to_hex, sign_inputs, spend_path_for,
};
pub use script::{
    x_only_from_slice, CommitmentOutput, CustodyOutput, ScriptFactory, NUMS_INTERNAL_KEY,
};
pub use signer::{LocalSigner, Signer, SigningSpec};
pub use tx_builder::{TransactionBuilder, DUST_LIMIT};
pub use types::{
    AddressInfo, ChainStats, CustodyInput, FeeCheck, MempoolStats, RecommendedFees, SpendPath,
    TxInput, TxOutput, UnsignedSpend, Utxo, UtxoStatus,
};
