//! Bounded retry around any sink

use super::{RecordSink, SinkError};
use crate::aggregate::AggregateRecord;
use crate::telemetry::{increment, CounterMetric};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::sleep;

/// Retry schedule: `max_retries` extra attempts, delay doubling from `initial_backoff`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1 << retry.saturating_sub(1).min(16))
    }
}

/// Retries failed sink operations; exhaustion surfaces as [`SinkError::RetriesExhausted`]
pub struct RetryingSink {
    inner: Box<dyn RecordSink>,
    policy: RetryPolicy,
}

impl RetryingSink {
    pub fn new(inner: Box<dyn RecordSink>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Sleep before the next attempt, or give up
    async fn backoff(
        policy: RetryPolicy,
        sink: &'static str,
        op: &'static str,
        retries: u32,
        error: SinkError,
    ) -> Result<u32, SinkError> {
        if retries >= policy.max_retries {
            tracing::error!(sink, op, error = %error, "Sink retries exhausted");
            return Err(SinkError::RetriesExhausted {
                sink,
                attempts: retries + 1,
                source: Box::new(error),
            });
        }

        let retry = retries + 1;
        increment(CounterMetric::SinkRetries);
        tracing::warn!(sink, op, retry, error = %error, "Sink operation failed, retrying");
        sleep(policy.delay(retry)).await;
        Ok(retry)
    }
}

#[async_trait]
impl RecordSink for RetryingSink {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn consume(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        let mut retries = 0;
        loop {
            match self.inner.consume(record).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retries = Self::backoff(self.policy, self.inner.name(), "consume", retries, e).await?
                }
            }
        }
    }

    async fn on_timer(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        let mut retries = 0;
        loop {
            match self.inner.on_timer(now).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retries = Self::backoff(self.policy, self.inner.name(), "rotate", retries, e).await?
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        let mut retries = 0;
        loop {
            match self.inner.close().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retries = Self::backoff(self.policy, self.inner.name(), "close", retries, e).await?
                }
            }
        }
    }
}
