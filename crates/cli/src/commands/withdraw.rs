//! Depositor withdrawal, co-signed by the operator when needed.

use super::{parse_address, AppContext};
use crate::output::OutputFormatter;
use anyhow::{Context, Result};
use custody_bitcoin::LocalSigner;
use custody_crypto::KeyPair;
use custody_orchestrator::{WithdrawalOrchestrator, WithdrawalRoute};
use serde::Serialize;

#[derive(Serialize)]
struct PlanSummary {
    route: WithdrawalRoute,
    inputs: Vec<String>,
    total_input_sats: u64,
    destination: String,
}

pub async fn withdraw(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    depositor_key: String,
    to: String,
    amount: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let secret = hex::decode(depositor_key.trim()).context("Depositor key must be hex")?;
    let depositor_key = KeyPair::from_slice(&secret).context("Invalid depositor key")?;
    let destination = parse_address(&to, ctx.network())?;

    let account = ctx.account(&depositor_key.public_key())?;
    let indexer = ctx.indexer();
    let utxos = account.scan(indexer.as_ref()).await?;

    let orchestrator = WithdrawalOrchestrator::new(indexer.clone())
        .with_policy(ctx.config.unconfirmed_policy()?)
        .with_dust_floor(ctx.config.dust_floor);
    let plan = orchestrator.plan_withdrawal(&account, &utxos, &destination, amount)?;

    if dry_run {
        let summary = PlanSummary {
            route: plan.route,
            inputs: plan.inputs.iter().map(|i| i.utxo.outpoint()).collect(),
            total_input_sats: plan.total_input_sats,
            destination: destination.to_string(),
        };
        if formatter.json_mode {
            return formatter.json(&summary);
        }
        formatter.header("Withdrawal Plan");
        formatter.kv("Route", &summary.route.to_string());
        formatter.kv("Inputs", &summary.inputs.join(", "));
        formatter.kv("Total", &formatter.format_sats(summary.total_input_sats));
        formatter.kv("Destination", &summary.destination);
        return Ok(());
    }

    let depositor = LocalSigner::new(depositor_key, ctx.network()).with_indexer(indexer);
    let receipt = match plan.route {
        WithdrawalRoute::CoSigned => {
            let operator = ctx.operator_signer()?;
            orchestrator.execute(&plan, &depositor, Some(&operator)).await?
        }
        WithdrawalRoute::SelfSigned => orchestrator.execute(&plan, &depositor, None).await?,
    };

    if formatter.json_mode {
        formatter.json(&receipt)?;
    } else {
        formatter.success(&format!("Withdrawal broadcast: {}", receipt.txid));
        formatter.kv("Route", &receipt.route.to_string());
        formatter.kv("Inputs", &receipt.inputs.to_string());
        formatter.kv("Amount", &formatter.format_sats(receipt.amount));
        formatter.kv("Fee", &formatter.format_sats(receipt.fee));
        formatter.kv("Size", &format!("{} vB", receipt.vsize));
    }
    Ok(())
}
