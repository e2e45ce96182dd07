//! Check command implementation.
//!
//! Runs a single poll against the configured source and reports whether it
//! produced metrics.

use anyhow::{bail, Context};

use crate::config::Config;
use crate::poller::build_collector;

/// Runs one poll; fails if the source cannot be collected.
pub async fn command_check(config: &Config) -> anyhow::Result<()> {
    println!("🔍 Herakles Windows Collector - Source Check");
    println!("============================================");

    let mut collector = build_collector(config).context("cannot build collector")?;
    let source = collector.source().unwrap_or_default();
    println!("\n📡 Source: {}", source);

    match collector.check().await {
        Ok(poll) => {
            println!("   ✅ Poll succeeded in {:.2}ms", poll.timings.total.as_secs_f64() * 1000.0);
            println!("   📊 Flattened metrics: {}", poll.metrics.len());
            println!("   🏷️  Entities tracked: {}", collector.entities().total_len());
            if !poll.mismatches.is_empty() {
                println!("   ⚠️  Skipped metric families: {}", poll.mismatches.len());
                for mismatch in &poll.mismatches {
                    println!("      └─ {}", mismatch);
                }
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            collector.cleanup();
            bail!("check failed: {}", e);
        }
    }

    collector.cleanup();
    println!("\n✅ Source check passed");
    Ok(())
}
