//! Which unconfirmed deposits may be swept into a withdrawal.

use custody_types::{CustodyError, DepositUtxo, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UnconfirmedPolicy {
    #[default]
    AllowAll,
    /// Only the listed funding transactions.
    AllowList(HashSet<String>),
    RejectAll,
}

impl UnconfirmedPolicy {
    /// Build from a config mode (`allow_all`, `allow_list`, `reject_all`).
    pub fn from_config(mode: &str, allow_list: &[String]) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "allow_all" => Ok(Self::AllowAll),
            "reject_all" => Ok(Self::RejectAll),
            "allow_list" => Ok(Self::AllowList(
                allow_list.iter().map(|txid| txid.to_lowercase()).collect(),
            )),
            other => Err(CustodyError::Configuration(format!(
                "Unknown unconfirmed policy: {}",
                other
            ))),
        }
    }

    /// Confirmed deposits always pass.
    pub fn check(&self, utxo: &DepositUtxo) -> Result<()> {
        if utxo.confirmed {
            return Ok(());
        }
        let refused = |reason: &str| CustodyError::RefusedByPolicy {
            txid: utxo.txid.clone(),
            reason: reason.to_string(),
        };
        match self {
            Self::AllowAll => Ok(()),
            Self::AllowList(allowed) if allowed.contains(&utxo.txid.to_lowercase()) => Ok(()),
            Self::AllowList(_) => Err(refused("unconfirmed and not allow-listed")),
            Self::RejectAll => Err(refused("unconfirmed inputs are not accepted")),
        }
    }
}
