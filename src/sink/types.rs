//! Sink errors

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{sink} sink failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        sink: &'static str,
        attempts: u32,
        #[source]
        source: Box<SinkError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_display() {
        let err = SinkError::RetriesExhausted {
            sink: "csv",
            attempts: 3,
            source: Box::new(SinkError::Io(io::Error::other("disk full"))),
        };
        assert_eq!(
            err.to_string(),
            "csv sink failed after 3 attempts: IO error: disk full"
        );
    }
}
