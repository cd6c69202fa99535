//! Withdrawal Orchestrator
//!
//! Chooses, per withdrawal, between the two branches of the custody leaf:
//!
//! - **Co-signed**: any selected deposit is still time-locked. The depositor
//!   signs first, the operator completes and finalizes.
//! - **Self-signed**: every selected deposit has matured. The depositor signs
//!   alone with each input's sequence set to its lock.
//!
//! Both routes check the realized fee after signing and allow one re-sign
//! round before broadcasting.

use crate::account::DepositAccount;
use crate::fees::{sign_with_fee_correction, SigningStep};
use crate::policy::UnconfirmedPolicy;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::Address;
use custody_bitcoin::{
    extract_transaction, ChainIndexer, CustodyInput, Signer, SpendPath, TransactionBuilder,
};
use custody_types::{CustodyError, DepositUtxo, Result, DEFAULT_DUST_FLOOR};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalRoute {
    CoSigned,
    SelfSigned,
}

impl WithdrawalRoute {
    pub fn spend_path(&self) -> SpendPath {
        match self {
            WithdrawalRoute::CoSigned => SpendPath::Cooperative,
            WithdrawalRoute::SelfSigned => SpendPath::Unilateral,
        }
    }
}

impl std::fmt::Display for WithdrawalRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalRoute::CoSigned => write!(f, "co-signed"),
            WithdrawalRoute::SelfSigned => write!(f, "self-signed"),
        }
    }
}

/// Selected inputs and the route they are spent through.
#[derive(Debug, Clone)]
pub struct WithdrawalPlan {
    pub inputs: Vec<CustodyInput>,
    pub route: WithdrawalRoute,
    pub destination: Address,
    pub total_input_sats: u64,
}

/// Outcome of a broadcast withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub txid: String,
    pub route: WithdrawalRoute,
    pub inputs: usize,
    /// Amount delivered to the destination.
    pub amount: u64,
    pub fee: u64,
    pub vsize: u64,
}

pub struct WithdrawalOrchestrator {
    indexer: Arc<dyn ChainIndexer>,
    policy: UnconfirmedPolicy,
    dust_floor: u64,
}

impl WithdrawalOrchestrator {
    pub fn new(indexer: Arc<dyn ChainIndexer>) -> Self {
        Self {
            indexer,
            policy: UnconfirmedPolicy::default(),
            dust_floor: DEFAULT_DUST_FLOOR,
        }
    }

    pub fn with_policy(mut self, policy: UnconfirmedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dust_floor(mut self, dust_floor: u64) -> Self {
        self.dust_floor = dust_floor;
        self
    }

    /// Select deposits in the given order until `amount` is covered (all of
    /// them without an amount), skipping anything below the dust floor.
    pub fn plan_withdrawal(
        &self,
        account: &DepositAccount,
        utxos: &[DepositUtxo],
        destination: &Address,
        amount: Option<u64>,
    ) -> Result<WithdrawalPlan> {
        if amount == Some(0) {
            return Err(CustodyError::InvalidTransaction(
                "Withdrawal amount must be positive".to_string(),
            ));
        }

        let mut inputs = Vec::new();
        let mut total = 0u64;

        for utxo in utxos {
            if utxo.value < self.dust_floor {
                debug!(
                    "Skipping {} ({} sats below floor {})",
                    utxo.outpoint(),
                    utxo.value,
                    self.dust_floor
                );
                continue;
            }
            if amount.is_some_and(|target| total >= target) {
                break;
            }
            self.policy.check(utxo)?;
            inputs.push(account.custody_input(utxo)?);
            total += utxo.value;
        }

        if inputs.is_empty() {
            return Err(CustodyError::NoUtxoAvailable {
                dust_floor: self.dust_floor,
            });
        }
        if let Some(target) = amount.filter(|target| total < *target) {
            return Err(CustodyError::InsufficientFunds {
                available: total,
                required: target,
            });
        }

        let route = if inputs.iter().any(|input| input.utxo.locked) {
            WithdrawalRoute::CoSigned
        } else {
            WithdrawalRoute::SelfSigned
        };
        info!(
            "Planned {} withdrawal of {} input(s), {} sats to {}",
            route,
            inputs.len(),
            total,
            destination
        );

        Ok(WithdrawalPlan {
            inputs,
            route,
            destination: destination.clone(),
            total_input_sats: total,
        })
    }

    /// Execute `plan` through its route. `operator` is required for co-signed
    /// plans and ignored otherwise.
    pub async fn execute(
        &self,
        plan: &WithdrawalPlan,
        depositor: &dyn Signer,
        operator: Option<&dyn Signer>,
    ) -> Result<WithdrawalReceipt> {
        match plan.route {
            WithdrawalRoute::CoSigned => {
                let operator = operator.ok_or_else(|| {
                    CustodyError::Configuration(
                        "Co-signed withdrawal requires an operator signer".to_string(),
                    )
                })?;
                self.execute_co_signed(plan, depositor, operator).await
            }
            WithdrawalRoute::SelfSigned => self.execute_self(plan, depositor).await,
        }
    }

    pub async fn execute_co_signed(
        &self,
        plan: &WithdrawalPlan,
        depositor: &dyn Signer,
        operator: &dyn Signer,
    ) -> Result<WithdrawalReceipt> {
        let steps = [
            SigningStep {
                signer: depositor,
                auto_finalize: false,
            },
            SigningStep {
                signer: operator,
                auto_finalize: true,
            },
        ];
        self.sign_and_broadcast(plan, WithdrawalRoute::CoSigned, &steps)
            .await
    }

    pub async fn execute_self(
        &self,
        plan: &WithdrawalPlan,
        depositor: &dyn Signer,
    ) -> Result<WithdrawalReceipt> {
        if let Some(locked) = plan.inputs.iter().find(|input| input.utxo.locked) {
            return Err(CustodyError::RefusedByPolicy {
                txid: locked.utxo.txid.clone(),
                reason: "time-locked input needs the operator".to_string(),
            });
        }
        let steps = [SigningStep {
            signer: depositor,
            auto_finalize: true,
        }];
        self.sign_and_broadcast(plan, WithdrawalRoute::SelfSigned, &steps)
            .await
    }

    async fn sign_and_broadcast(
        &self,
        plan: &WithdrawalPlan,
        route: WithdrawalRoute,
        steps: &[SigningStep<'_>],
    ) -> Result<WithdrawalReceipt> {
        let path = route.spend_path();
        let fee_rates = self.indexer.get_recommended_fee_rates().await?;
        let builder = TransactionBuilder::new(fee_rates);
        let estimate = builder.build_spend(&plan.inputs, &plan.destination, path)?;

        let signed = sign_with_fee_correction(&builder, steps, estimate.fee_sats, |fee| {
            builder
                .build_spend_with_fee(&plan.inputs, &plan.destination, path, fee)
                .map(|spend| spend.psbt)
        })
        .await?;

        let tx = extract_transaction(&signed.psbt)?;
        let amount = tx
            .output
            .first()
            .map(|output| output.value.to_sat())
            .unwrap_or_default();
        let txid = self.indexer.broadcast_raw(&serialize_hex(&tx)).await?;

        info!(
            txid = %txid,
            fee = signed.fee,
            vsize = signed.vsize,
            "Broadcast {} withdrawal of {} sats",
            route,
            amount
        );
        Ok(WithdrawalReceipt {
            txid,
            route,
            inputs: plan.inputs.len(),
            amount,
            fee: signed.fee,
            vsize: signed.vsize,
        })
    }
}
