//! Test command implementation.
//!
//! Polls the configured source several times and prints what each poll
//! produced, including lifecycle signals.

use anyhow::Context;
use std::time::Duration;

use crate::config::Config;
use crate::poller::build_collector;

/// Runs `iterations` polls, `update_every` apart.
pub async fn command_test(iterations: usize, verbose: bool, config: &Config) -> anyhow::Result<()> {
    println!("🧪 Herakles Windows Collector - Test Mode");
    println!("=========================================");

    let mut collector = build_collector(config).context("cannot build collector")?;
    let pause = config.update_every();
    let mut failures = 0;

    for iteration in 1..=iterations {
        if iteration > 1 {
            tokio::time::sleep(pause).await;
        }
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let poll = match collector.collect_once().await {
            Ok(poll) => poll,
            Err(e) => {
                failures += 1;
                println!("   ❌ {}", e);
                continue;
            }
        };

        println!("   ⏱️  Fetch: {}", millis(poll.timings.fetch));
        println!("   ⏱️  Parse: {}", millis(poll.timings.parse));
        println!("   ⏱️  Flatten: {}", millis(poll.timings.flatten));
        println!("   📊 Flattened metrics: {}", poll.metrics.len());
        println!("   🏷️  Entities tracked: {}", collector.entities().total_len());

        if poll.signals.is_empty() {
            println!("   💤 No lifecycle changes");
        } else {
            println!("   🔔 Lifecycle signals: {}", poll.signals.len());
            for signal in &poll.signals {
                println!("      ├─ {} {} {}", signal.kind, signal.family, signal.entity_id);
            }
        }

        for mismatch in &poll.mismatches {
            println!("   ⚠️  {}", mismatch);
        }

        if verbose {
            let mut keys: Vec<_> = poll.metrics.iter().collect();
            keys.sort();
            for (key, value) in keys {
                println!("      {} = {}", key, value);
            }
        }
    }

    collector.cleanup();

    if failures > 0 {
        anyhow::bail!("{} of {} polls failed", failures, iterations);
    }
    println!("\n✅ Test completed successfully");
    Ok(())
}

fn millis(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}
