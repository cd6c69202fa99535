//! Output formatting utilities for CLI.
//!
//! Table and JSON output modes with optional colorization.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

pub struct OutputFormatter {
    colored: bool,
    pub json_mode: bool,
}

impl OutputFormatter {
    pub fn new(colored: bool, json_mode: bool) -> Self {
        Self { colored, json_mode }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("{} {}", "✓".green().bold(), message.green());
        } else {
            println!("✓ {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("✗ {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("{} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("⚠ {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("{} {}", "ℹ".blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n{}", title.bold().underline());
        } else {
            println!("\n{}", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("  {}: {}", key.bold(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }

    pub fn table<T: Tabled>(&self, data: Vec<T>) {
        if data.is_empty() {
            self.info("No data to display");
            return;
        }

        let mut table = Table::new(data);
        table.with(Style::rounded());

        println!("\n{}", table);
    }

    /// Output rows in the configured format (table or JSON).
    pub fn output<T: Serialize + Tabled>(&self, data: Vec<T>) -> Result<()> {
        if self.json_mode {
            self.json(&data)
        } else {
            self.table(data);
            Ok(())
        }
    }

    /// Format satoshis as BTC with 8 decimal places
    pub fn format_btc(&self, sats: u64) -> String {
        let btc = sats as f64 / 100_000_000.0;
        format!("{:.8} BTC", btc)
    }

    /// Format satoshis with thousands separator
    pub fn format_sats(&self, sats: u64) -> String {
        format!("{} sats", Self::format_number(sats))
    }

    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();
        for (i, c) in s.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result.chars().rev().collect()
    }

    /// Lock status of a deposit.
    pub fn format_lock(&self, locked: bool) -> String {
        let label = if locked { "locked" } else { "unlocked" };
        if !self.colored {
            return label.to_string();
        }
        if locked {
            label.yellow().to_string()
        } else {
            label.green().to_string()
        }
    }

    pub fn format_bool(&self, value: bool) -> String {
        if !self.colored {
            return value.to_string();
        }

        if value {
            "true".green().to_string()
        } else {
            "false".red().to_string()
        }
    }

    /// Format timestamp in human-readable form
    pub fn format_timestamp(&self, timestamp: &chrono::DateTime<chrono::Utc>) -> String {
        let now = chrono::Utc::now();
        let duration = now.signed_duration_since(*timestamp);

        if duration.num_seconds() < 60 {
            format!("{} seconds ago", duration.num_seconds())
        } else if duration.num_minutes() < 60 {
            format!("{} minutes ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{} hours ago", duration.num_hours())
        } else {
            format!("{} days ago", duration.num_days())
        }
    }
}

/// Shorten a txid to `abcd1234…89ef` for tables.
pub fn short_txid(txid: &str) -> String {
    if txid.len() <= 16 {
        return txid.to_string();
    }
    format!("{}…{}", &txid[..8], &txid[txid.len() - 4..])
}
