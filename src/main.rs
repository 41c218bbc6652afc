//! Evaluation Scoring Pipeline - Main Entry Point
//!
//! Consumes raw records from NATS, scores them against the configured model
//! ensembles, and publishes assembled output rows. Records are processed
//! strictly one at a time; parallelism lives inside the engine.

use anyhow::Result;
use eval_scoring_pipeline::{
    config::EvalConfig, consumer::RecordConsumer, engine::Engine,
    models::loader::SpecFileModelProvider, producer::RowProducer, types::record::Record,
    types::record::RecordHeader,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eval_scoring_pipeline=info".parse()?),
        )
        .init();

    info!("Starting Evaluation Scoring Pipeline");

    // Load configuration
    let config = EvalConfig::load()?;
    info!(
        mode = ?config.eval.mode,
        models = config.models.primary_score_names.len(),
        sub_groups = config.models.sub_groups.len(),
        "Configuration loaded"
    );

    // Initialize the engine; configuration errors fail here, before any
    // record is consumed.
    let provider = SpecFileModelProvider::new(&config.models.spec_dir);
    let mut engine = Engine::initialize(config.clone(), Box::new(provider))?;
    info!(
        run_id = %engine.run_id(),
        fields = engine.schema().len(),
        "Output schema planned"
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RecordConsumer::new(client.clone(), &config.nats.record_subject);
    let producer = RowProducer::new(
        client.clone(),
        &config.nats.output_subject,
        &config.nats.status_subject,
        &config.data.delimiter,
    );

    info!("Listening on subject: {}", config.nats.record_subject);
    info!("Publishing rows to: {}", config.nats.output_subject);

    let header = Arc::new(RecordHeader::new(&config.data.headers));
    let mut subscription = consumer.subscribe().await?;

    let mut consumed: u64 = 0;
    let mut emitted: u64 = 0;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, draining");
                break;
            }
        };

        let line = String::from_utf8_lossy(&message.payload);
        let record = Record::parse_delimited(header.clone(), line.trim_end(), &config.data.delimiter);
        consumed += 1;

        match engine.score_one(&record) {
            Ok(Some(row)) => {
                emitted += 1;
                if let Err(e) = producer.publish(&row).await {
                    error!(error = %e, "Failed to publish output row");
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Fatal: threshold breaches and load failures abort the run.
                error!(error = %e, "Engine aborted");
                break;
            }
        }

        if consumed % config.pipeline.progress_every == 0 {
            info!(consumed, emitted, "Processing milestone");
        }
    }

    info!("Pipeline shutting down...");
    let finals = engine.shutdown_and_flush();
    finals.log_summary();
    if let Err(e) = producer.publish_status(&finals).await {
        warn!(error = %e, "Failed to publish status report");
    }

    Ok(())
}
