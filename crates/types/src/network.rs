//! Network selection.

use crate::error::CustodyError;
use serde::{Deserialize, Serialize};

/// Network a deposit lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "mainnet")]
    Livenet,
    #[default]
    Testnet,
    Signet,
    /// Local regtest node behind a self-hosted mempool instance.
    #[serde(alias = "regtest")]
    Devnet,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Livenet,
        Network::Testnet,
        Network::Signet,
        Network::Devnet,
    ];

    /// Get the bitcoin crate Network type.
    pub fn to_bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Livenet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Devnet => bitcoin::Network::Regtest,
        }
    }

    /// Base URL of the mempool.space compatible API.
    pub fn api_url(&self) -> String {
        match self {
            Network::Devnet => "http://localhost:8999/api/v1".to_string(),
            Network::Livenet => "https://mempool.space/api".to_string(),
            other => format!("https://mempool.space/{}/api", other),
        }
    }

    /// Full URL for an API path such as `/address/{addr}/utxo` or
    /// `/v1/fees/recommended`. The devnet instance serves everything under `/v1`.
    pub fn endpoint(&self, path: &str) -> String {
        let path = path.strip_prefix("/api").unwrap_or(path);
        match self {
            Network::Devnet => {
                let path = path.strip_prefix("/v1").unwrap_or(path);
                format!("{}{}", self.api_url(), path)
            }
            _ => format!("{}{}", self.api_url(), path),
        }
    }

    /// Get the block explorer URL.
    pub fn explorer_url(&self) -> String {
        match self {
            Network::Devnet => "http://localhost:8999".to_string(),
            Network::Livenet => "https://mempool.space".to_string(),
            other => format!("https://mempool.space/{}", other),
        }
    }

    /// Fee rates are pinned on devnet, where the indexer has no fee market.
    pub fn fixed_fee_rates(&self) -> Option<crate::FeeRates> {
        match self {
            Network::Devnet => Some(crate::FeeRates::new(1, 1)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Livenet => write!(f, "livenet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Signet => write!(f, "signet"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "livenet" | "mainnet" | "main" | "bitcoin" => Ok(Network::Livenet),
            "testnet" | "test" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "devnet" | "regtest" => Ok(Network::Devnet),
            _ => Err(CustodyError::Configuration(format!("Unknown network: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_urls() {
        assert_eq!(Network::Livenet.api_url(), "https://mempool.space/api");
        assert_eq!(Network::Testnet.api_url(), "https://mempool.space/testnet/api");
        assert_eq!(Network::Signet.api_url(), "https://mempool.space/signet/api");
        assert_eq!(Network::Devnet.api_url(), "http://localhost:8999/api/v1");
    }

    #[test]
    fn test_endpoint_versioning() {
        assert_eq!(
            Network::Testnet.endpoint("/v1/fees/recommended"),
            "https://mempool.space/testnet/api/v1/fees/recommended"
        );
        assert_eq!(
            Network::Devnet.endpoint("/v1/fees/recommended"),
            "http://localhost:8999/api/v1/fees/recommended"
        );
        assert_eq!(
            Network::Devnet.endpoint("/api/blocks/tip/height"),
            "http://localhost:8999/api/v1/blocks/tip/height"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for network in Network::ALL {
            let parsed: Network = network.to_string().parse().unwrap();
            assert_eq!(parsed, network);
        }
        assert!("moonnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_devnet_fee_rates_pinned() {
        let rates = Network::Devnet.fixed_fee_rates().unwrap();
        assert_eq!((rates.minimum, rates.fastest), (1, 1));
        assert!(Network::Testnet.fixed_fee_rates().is_none());
    }
}
