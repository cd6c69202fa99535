//! Signature share commands.

use super::{parse_nonce, AppContext};
use crate::output::OutputFormatter;
use anyhow::{Context, Result};
use custody_orchestrator::{RecoveryEngine, SignatureShareEngine};
use custody_types::ShareTag;
use serde::Serialize;
use tabled::Tabled;

#[derive(Serialize, Tabled)]
struct ShareRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn list(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: String,
) -> Result<()> {
    let engine = SignatureShareEngine::new(ctx.store());
    let nonce = parse_nonce(&nonce)?;
    let shares = engine.get_shares(&txid, nonce).await?;

    if formatter.json_mode {
        return formatter.json(&shares.values().collect::<Vec<_>>());
    }
    formatter.table(
        shares
            .values()
            .map(|share| ShareRow {
                tag: share.tag.to_string(),
                value: share.value.clone(),
            })
            .collect(),
    );
    if engine.is_slashable(&txid, nonce).await? {
        formatter.warning("Both shares are published: the commitment is slashable");
    }
    Ok(())
}

pub async fn submit(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: String,
    tag: String,
    value: String,
) -> Result<()> {
    let engine = SignatureShareEngine::new(ctx.store());
    let nonce = parse_nonce(&nonce)?;
    let tag: ShareTag = tag.parse().context("Tag must be 'up' or 'down'")?;

    let stored = engine
        .submit_share(&txid, nonce, tag, &value, tag.message())
        .await?;
    if stored {
        formatter.success(&format!("Accepted '{}' share for {}:{:02x}", tag, txid, nonce));
    } else {
        formatter.info("Share already recorded");
    }

    if engine.is_slashable(&txid, nonce).await? {
        formatter.warning("Both shares are published: the commitment is slashable");
    }
    Ok(())
}

/// Depositor side: derive the share for `tag` from the depositor secret and
/// publish it.
pub async fn create(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: String,
    tag: String,
    secret: String,
) -> Result<()> {
    let engine = SignatureShareEngine::new(ctx.store());
    let nonce = parse_nonce(&nonce)?;
    let tag: ShareTag = tag.parse().context("Tag must be 'up' or 'down'")?;

    if engine.would_expose_key(&txid, nonce, tag).await? {
        formatter.warning(&format!(
            "The other share of {}:{:02x} is published: this one exposes the one-time key",
            txid, nonce
        ));
    }
    let share = engine
        .create_share(secret.as_bytes(), &txid, nonce, tag)
        .await?;

    if formatter.json_mode {
        return formatter.json(&share);
    }
    formatter.success(&format!("Published '{}' share for {}:{:02x}", tag, txid, nonce));
    formatter.kv("Value", &share.value);
    Ok(())
}

#[derive(Serialize)]
struct RecoveredKey {
    txid: String,
    nonce: u8,
    one_time_pubkey: String,
}

/// Recover the one-time key and print its public half.
pub async fn recover(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: String,
) -> Result<()> {
    let engine = RecoveryEngine::new(ctx.store())?;
    let nonce = parse_nonce(&nonce)?;
    let key = engine.recover_one_time_key(&txid, nonce).await?;

    let recovered = RecoveredKey {
        txid,
        nonce,
        one_time_pubkey: key.public_key().to_string(),
    };
    if formatter.json_mode {
        formatter.json(&recovered)?;
    } else {
        formatter.success("One-time key recovered");
        formatter.kv("Commitment", &format!("{}:{:02x}", recovered.txid, nonce));
        formatter.kv("Public key", &recovered.one_time_pubkey);
    }
    Ok(())
}
