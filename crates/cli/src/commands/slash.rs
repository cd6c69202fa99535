//! Slashing a commitment whose shares are both published.

use super::{parse_address, parse_nonce, AppContext};
use crate::output::OutputFormatter;
use anyhow::Result;
use custody_orchestrator::RecoveryEngine;
use custody_types::CustodyError;
use tracing::warn;

pub async fn slash(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: String,
    penalty: Option<String>,
    broadcast: bool,
) -> Result<()> {
    let nonce = parse_nonce(&nonce)?;
    let penalty = match penalty {
        Some(address) => parse_address(&address, ctx.network())?,
        None => ctx.penalty_sink()?,
    };
    let operator = ctx.operator_signer()?;
    let indexer = ctx.indexer();
    let fee_rates = indexer.get_recommended_fee_rates().await?;

    let engine = RecoveryEngine::new(ctx.store())?;
    let slash = engine
        .slash(&txid, nonce, &penalty, &operator, fee_rates)
        .await?;

    if broadcast {
        // The depositor may already have published the commitment.
        match indexer.broadcast_raw(&slash.commitment_tx).await {
            Ok(txid) => formatter.success(&format!("Commitment broadcast: {}", txid)),
            Err(CustodyError::InvalidTransaction(reason)) => {
                warn!("Commitment broadcast rejected: {}", reason);
                formatter.warning(&format!("Commitment not broadcast: {}", reason));
            }
            Err(e) => return Err(e.into()),
        }
        let slash_txid = indexer.broadcast_raw(&slash.slash_tx).await?;
        formatter.success(&format!("Slash broadcast: {}", slash_txid));
    }

    if formatter.json_mode {
        formatter.json(&slash)?;
    } else {
        formatter.header("Slash");
        formatter.kv("Penalty address", &penalty.to_string());
        formatter.kv("Commitment txid", &slash.commitment_txid);
        formatter.kv("Slash txid", &slash.slash_txid);
        formatter.kv("Fee", &formatter.format_sats(slash.fee));
        if !broadcast {
            formatter.kv("Commitment tx", &slash.commitment_tx);
            formatter.kv("Slash tx", &slash.slash_tx);
            formatter.info("Not broadcast; pass --broadcast to publish both transactions");
        }
    }
    Ok(())
}
