//! Console sink

use super::csv::encode_record;
use super::{RecordSink, SinkError};
use crate::aggregate::AggregateRecord;
use async_trait::async_trait;

/// Prints each record as a line on stdout
#[derive(Debug, Default)]
pub struct ConsoleSink {
    printed: u64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }
}

#[async_trait]
impl RecordSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        let row = encode_record(record)?;
        print!("{}", String::from_utf8_lossy(&row));
        self.printed += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
