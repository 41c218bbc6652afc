//! NATS producer for assembled output rows and the status report

use crate::counters::FinalCounters;
use crate::schema::OutputRow;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer publishing assembled rows and the shutdown status report
#[derive(Clone)]
pub struct RowProducer {
    client: Client,
    output_subject: String,
    status_subject: String,
    delimiter: String,
}

impl RowProducer {
    /// Create a new row producer
    pub fn new(
        client: Client,
        output_subject: &str,
        status_subject: &str,
        delimiter: &str,
    ) -> Self {
        Self {
            client,
            output_subject: output_subject.to_string(),
            status_subject: status_subject.to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    /// Publish one assembled output row as a delimited line
    pub async fn publish(&self, row: &OutputRow) -> Result<()> {
        let line = row.to_delimited(&self.delimiter);

        self.client
            .publish(self.output_subject.clone(), line.into_bytes().into())
            .await?;

        debug!(fields = row.len(), "Published output row");
        Ok(())
    }

    /// Publish the final counters report to the status subject
    pub async fn publish_status(&self, counters: &FinalCounters) -> Result<()> {
        let payload = serde_json::to_vec(counters)?;

        self.client
            .publish(self.status_subject.clone(), payload.into())
            .await?;

        debug!(run_id = %counters.run_id, "Published status report");
        Ok(())
    }

    /// Get the output subject name
    pub fn output_subject(&self) -> &str {
        &self.output_subject
    }
}
