//! A depositor's custody addresses.

use bitcoin::secp256k1::PublicKey;
use bitcoin::Address;
use custody_bitcoin::{
    protocol_balance, scan_deposits, ChainIndexer, CustodyInput, CustodyOutput, ScriptFactory,
};
use custody_types::{Balance, CustodyError, DepositUtxo, Network, Result};
use tracing::debug;

/// Custody outputs shared by one operator and one depositor, one per lock.
#[derive(Debug, Clone)]
pub struct DepositAccount {
    network: Network,
    operator: PublicKey,
    depositor: PublicKey,
    outputs: Vec<CustodyOutput>,
}

impl DepositAccount {
    pub fn new(
        factory: &ScriptFactory,
        operator: &PublicKey,
        depositor: &PublicKey,
        locks: &[u32],
        network: Network,
    ) -> Result<Self> {
        let outputs = factory.deposit_outputs(
            &operator.x_only_public_key().0,
            &depositor.x_only_public_key().0,
            locks,
            network,
        )?;
        debug!(
            "Deposit account for {} on {}: {} address(es)",
            depositor,
            network,
            outputs.len()
        );
        Ok(Self {
            network,
            operator: *operator,
            depositor: *depositor,
            outputs,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn operator(&self) -> &PublicKey {
        &self.operator
    }

    pub fn depositor(&self) -> &PublicKey {
        &self.depositor
    }

    pub fn outputs(&self) -> &[CustodyOutput] {
        &self.outputs
    }

    /// `(lock, address)` pairs in lock-set order.
    pub fn addresses(&self) -> Vec<(u32, Address)> {
        self.outputs
            .iter()
            .map(|output| (output.lock_blocks, output.address.clone()))
            .collect()
    }

    pub fn output_for_lock(&self, lock_blocks: u32) -> Option<&CustodyOutput> {
        self.outputs
            .iter()
            .find(|output| output.lock_blocks == lock_blocks)
    }

    /// Pair a deposit with the custody output of its lock.
    pub fn custody_input(&self, utxo: &DepositUtxo) -> Result<CustodyInput> {
        let output = self
            .output_for_lock(utxo.lock_blocks)
            .ok_or(CustodyError::InvalidLock {
                lock_blocks: i64::from(utxo.lock_blocks),
            })?;
        Ok(CustodyInput {
            utxo: utxo.clone(),
            output: output.clone(),
        })
    }

    /// UTXOs on every address with their lock status.
    pub async fn scan(&self, indexer: &dyn ChainIndexer) -> Result<Vec<DepositUtxo>> {
        scan_deposits(indexer, &self.outputs).await
    }

    /// Protocol balance across every address.
    pub async fn balance(&self, indexer: &dyn ChainIndexer) -> Result<Balance> {
        protocol_balance(indexer, &self.outputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_crypto::KeyPair;
    use custody_types::DEFAULT_LOCK_SET;

    fn account() -> DepositAccount {
        let factory = ScriptFactory::new().unwrap();
        let operator = KeyPair::from_slice(&[0x11; 32]).unwrap().public_key();
        let depositor = KeyPair::from_slice(&[0x22; 32]).unwrap().public_key();
        DepositAccount::new(&factory, &operator, &depositor, &DEFAULT_LOCK_SET, Network::Signet)
            .unwrap()
    }

    #[test]
    fn test_one_address_per_lock() {
        let account = account();
        let addresses = account.addresses();
        assert_eq!(addresses.len(), 3);
        assert_eq!(
            addresses.iter().map(|(lock, _)| *lock).collect::<Vec<_>>(),
            vec![1, 10, 100]
        );
        assert_ne!(addresses[0].1, addresses[1].1);
        assert_ne!(addresses[1].1, addresses[2].1);
    }

    #[test]
    fn test_custody_input_requires_known_lock() {
        let account = account();
        let utxo = DepositUtxo::new("aa".repeat(32), 0, 10_000, Some(100), 10, 200);
        let input = account.custody_input(&utxo).unwrap();
        assert_eq!(input.output.lock_blocks, 10);

        let stray = DepositUtxo::new("bb".repeat(32), 0, 10_000, Some(100), 7, 200);
        assert!(matches!(
            account.custody_input(&stray),
            Err(CustodyError::InvalidLock { lock_blocks: 7 })
        ));
    }
}
