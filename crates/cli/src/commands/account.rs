//! Operator key and depositor account commands.

use super::{parse_depositor, AppContext};
use crate::output::{short_txid, OutputFormatter};
use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

#[derive(Serialize)]
struct OperatorKeyInfo {
    network: String,
    co_signer_pubkey: String,
    co_signer_x_only: String,
    penalty_address: String,
}

#[derive(Serialize, Tabled)]
struct AddressRow {
    #[tabled(rename = "Lock (blocks)")]
    lock_blocks: u32,
    #[tabled(rename = "Address")]
    address: String,
}

#[derive(Serialize, Tabled)]
struct UtxoRow {
    #[tabled(rename = "Outpoint")]
    outpoint: String,
    #[tabled(rename = "Value (sats)")]
    value: u64,
    #[tabled(rename = "Lock")]
    lock_blocks: u32,
    #[tabled(rename = "Height")]
    height: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn operator_key(ctx: &AppContext, formatter: &OutputFormatter) -> Result<()> {
    let key = ctx.operator_key()?;
    let info = OperatorKeyInfo {
        network: ctx.network().to_string(),
        co_signer_pubkey: key.public_key().to_string(),
        co_signer_x_only: key.x_only_public_key().to_string(),
        penalty_address: ctx.penalty_sink()?.to_string(),
    };

    if formatter.json_mode {
        formatter.json(&info)?;
    } else {
        formatter.header("Operator Key");
        formatter.kv("Network", &info.network);
        formatter.kv("Co-signer", &info.co_signer_pubkey);
        formatter.kv("Co-signer (x-only)", &info.co_signer_x_only);
        formatter.kv("Penalty address", &info.penalty_address);
    }
    Ok(())
}

pub async fn addresses(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    depositor: String,
) -> Result<()> {
    let account = ctx.account(&parse_depositor(&depositor)?)?;
    let rows = account
        .addresses()
        .into_iter()
        .map(|(lock_blocks, address)| AddressRow {
            lock_blocks,
            address: address.to_string(),
        })
        .collect();
    formatter.output(rows)
}

pub async fn utxos(ctx: &AppContext, formatter: &OutputFormatter, depositor: String) -> Result<()> {
    let account = ctx.account(&parse_depositor(&depositor)?)?;
    let utxos = account.scan(ctx.indexer().as_ref()).await?;

    if formatter.json_mode {
        return formatter.json(&utxos);
    }

    let rows = utxos
        .iter()
        .map(|utxo| UtxoRow {
            outpoint: format!("{}:{}", short_txid(&utxo.txid), utxo.vout),
            value: utxo.value,
            lock_blocks: utxo.lock_blocks,
            height: utxo
                .block_height
                .map(|h| h.to_string())
                .unwrap_or_else(|| "mempool".to_string()),
            status: formatter.format_lock(utxo.locked),
        })
        .collect();
    formatter.table(rows);

    let total: u64 = utxos.iter().map(|utxo| utxo.value).sum();
    formatter.info(&format!(
        "{} deposit(s), {}",
        utxos.len(),
        formatter.format_sats(total)
    ));
    Ok(())
}

pub async fn balance(
    ctx: &AppContext,
    formatter: &OutputFormatter,
    depositor: String,
) -> Result<()> {
    let account = ctx.account(&parse_depositor(&depositor)?)?;
    let balance = account.balance(ctx.indexer().as_ref()).await?;

    if formatter.json_mode {
        formatter.json(&balance)?;
    } else {
        formatter.header("Protocol Balance");
        formatter.kv("Confirmed", &formatter.format_sats(balance.confirmed));
        formatter.kv("Unconfirmed", &format!("{} sats", balance.unconfirmed));
        formatter.kv("Total", &formatter.format_btc(balance.total));
    }
    Ok(())
}
