//! Display utilities for terminal output

use colored::Colorize;

use crate::core::types::PoolInitializationRecord;

pub fn print_pool_initialization(record: &PoolInitializationRecord) {
    println!("\n{} {}", "🌊", "NEW POOL INITIALIZATION DETECTED".bold().green());
    println!("{}", "=".repeat(70));
    println!("   Signature:         {}", record.signature.cyan());
    println!("   Token Address:     {}", record.token_address.bold());
    println!("   Liquidity Address: {}", record.liquidity_address);
    println!(
        "   Observed At:       {}",
        record.observed_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    println!("   Solscan:           {}", solscan_tx_link(&record.signature).dimmed());
    println!("{}", "=".repeat(70));
}

pub fn solscan_tx_link(signature: &str) -> String {
    format!("https://solscan.io/tx/{}", signature)
}
