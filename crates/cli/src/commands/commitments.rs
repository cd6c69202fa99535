//! Commitment listing and inspection.

use super::{parse_nonce, AppContext};
use crate::output::{short_txid, OutputFormatter};
use anyhow::{Context, Result};
use clap::Args;
use custody_crypto::parse_public_key;
use custody_orchestrator::{CommitmentEngine, CommitmentRequest, SignatureShareEngine};
use custody_types::{Commitment, Network, NonceSignature};
use serde::Serialize;
use tabled::Tabled;

/// A depositor-signed commitment submitted for registration.
#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    /// Deposit txid the commitment spends
    pub txid: String,

    /// Commitment nonce (decimal or 0x-prefixed hex)
    pub nonce: String,

    /// Depositor-signed commitment PSBT (hex)
    #[arg(long, value_name = "HEX")]
    pub psbt: String,

    /// One-time public key (compressed hex)
    #[arg(long, value_name = "PUBKEY")]
    pub one_time_pubkey: String,

    /// Nonce signature r (32-byte hex)
    #[arg(long, value_name = "HEX")]
    pub r: String,

    /// Nonce signature s (32-byte hex)
    #[arg(long, value_name = "HEX")]
    pub s: String,
}

impl RegisterArgs {
    fn into_request(self, network: Network) -> Result<CommitmentRequest> {
        let nonce = parse_nonce(&self.nonce)?;
        let one_time_pubkey = parse_public_key(&self.one_time_pubkey)
            .with_context(|| format!("Invalid one-time public key '{}'", self.one_time_pubkey))?;
        Ok(CommitmentRequest {
            txid: self.txid.trim().to_string(),
            nonce,
            psbt: self.psbt.trim().to_string(),
            one_time_pubkey,
            nonce_signature: NonceSignature {
                r: self.r.trim().to_lowercase(),
                s: self.s.trim().to_lowercase(),
            },
            network,
        })
    }
}

#[derive(Serialize, Tabled)]
struct CommitmentRow {
    #[tabled(rename = "Outpoint")]
    outpoint: String,
    #[tabled(rename = "Nonce")]
    nonce: String,
    #[tabled(rename = "One-time key")]
    one_time_pubkey: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl CommitmentRow {
    fn new(commitment: &Commitment, formatter: &OutputFormatter) -> Self {
        Self {
            outpoint: format!("{}:{}", short_txid(&commitment.txid), commitment.vout),
            nonce: format!("0x{:02x}", commitment.nonce),
            one_time_pubkey: short_txid(&commitment.one_time_pubkey),
            created: formatter.format_timestamp(&commitment.created_at),
        }
    }
}

pub async fn list(ctx: &AppContext, formatter: &OutputFormatter, limit: usize) -> Result<()> {
    let engine = CommitmentEngine::new(ctx.store())?;
    let commitments = engine.list_commitments(ctx.network(), limit).await?;

    if formatter.json_mode {
        return formatter.json(&commitments);
    }
    formatter.table(
        commitments
            .iter()
            .map(|c| CommitmentRow::new(c, formatter))
            .collect(),
    );
    Ok(())
}

/// Verify a commitment against the operator co-signing key and store it.
pub async fn register(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    args: RegisterArgs,
) -> Result<()> {
    let request = args.into_request(ctx.network())?;
    let operator = ctx.operator_key()?.public_key();
    let engine = CommitmentEngine::new(ctx.store())?;
    let commitment = engine.register_commitment(request, &operator).await?;

    if formatter.json_mode {
        return formatter.json(&commitment);
    }
    formatter.success(&format!(
        "Registered commitment {}:{} nonce 0x{:02x}",
        commitment.txid, commitment.vout, commitment.nonce
    ));
    formatter.kv("One-time key", &commitment.one_time_pubkey);
    formatter.kv("Created", &commitment.created_at.to_rfc3339());
    Ok(())
}

/// Show one commitment, or all commitments of `txid` when no nonce is given.
pub async fn show(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    txid: String,
    nonce: Option<String>,
) -> Result<()> {
    let engine = CommitmentEngine::new(ctx.store())?;
    let shares = SignatureShareEngine::new(ctx.store());

    let commitments = match nonce {
        Some(nonce) => vec![engine.get_commitment(&txid, parse_nonce(&nonce)?).await?],
        None => engine.commitments_for(&txid).await?,
    };

    if formatter.json_mode {
        return formatter.json(&commitments);
    }
    if commitments.is_empty() {
        formatter.info(&format!("No commitments for {}", txid));
        return Ok(());
    }

    for commitment in &commitments {
        let published = shares.get_shares(&commitment.txid, commitment.nonce).await?;
        let tags: Vec<String> = published.keys().map(|tag| tag.to_string()).collect();

        formatter.header(&format!(
            "Commitment {}:{} nonce 0x{:02x}",
            commitment.txid, commitment.vout, commitment.nonce
        ));
        formatter.kv("Network", &commitment.network.to_string());
        formatter.kv("One-time key", &commitment.one_time_pubkey);
        formatter.kv("Nonce signature r", &commitment.nonce_signature.r);
        formatter.kv("Created", &commitment.created_at.to_rfc3339());
        formatter.kv(
            "Shares",
            &if tags.is_empty() {
                "none".to_string()
            } else {
                tags.join(", ")
            },
        );
        formatter.kv("Slashable", &formatter.format_bool(published.len() == 2));
    }
    Ok(())
}
