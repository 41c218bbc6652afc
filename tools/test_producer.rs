//! Test Record Producer
//!
//! Generates and publishes delimited evaluation records to NATS for
//! pipeline testing.

use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Generator for delimited record lines matching the sample configuration:
/// id | target | wgt | txn_amount | txn_count | account_age
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    record_counter: u64,
}

impl RecordGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            record_counter: 0,
        }
    }

    /// Generate one record line. `bad_weight_rate` controls how often the
    /// weight cell is unparseable, to exercise the validation counters.
    fn generate(&mut self, pos_rate: f64, bad_weight_rate: f64) -> String {
        self.record_counter += 1;

        let tag = if self.rng.gen_bool(pos_rate) { "1" } else { "0" };
        let weight = if self.rng.gen_bool(bad_weight_rate) {
            "n/a".to_string()
        } else {
            format!("{:.2}", self.rng.gen_range(0.5..3.0))
        };

        format!(
            "rec_{:010}|{}|{}|{:.2}|{}|{}",
            self.record_counter,
            tag,
            weight,
            self.rng.gen_range(10.0..5000.0),
            self.rng.gen_range(0..50),
            self.rng.gen_range(30..3000),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Record Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("eval.records");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let pos_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let bad_weight_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.01);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(10);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        pos_rate = pos_rate,
        bad_weight_rate = bad_weight_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, pos_rate, bad_weight_rate, delay_ms).await;
        }
    };

    let mut generator = RecordGenerator::new();

    info!("Starting to publish {} records...", count);

    for i in 0..count {
        let line = generator.generate(pos_rate, bad_weight_rate);

        client
            .publish(subject.to_string(), line.into_bytes().into())
            .await?;

        if (i + 1) % 100 == 0 {
            info!("Published {}/{} records", i + 1, count);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Published {} records", count);

    Ok(())
}

async fn run_dry_mode(
    count: u64,
    pos_rate: f64,
    bad_weight_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RecordGenerator::new();

    for i in 0..count {
        let line = generator.generate(pos_rate, bad_weight_rate);

        if (i + 1) % 100 == 0 || i == 0 {
            info!("Sample record {}: {}", i + 1, line);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
