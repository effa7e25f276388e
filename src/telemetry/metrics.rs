//! Prometheus metrics

use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Ticks handed to the driver
    TicksReceived,
    /// Raw lines that failed to parse
    TicksMalformed,
    /// Ticks behind the watermark folded into a still-open window
    TicksLateIncluded,
    /// Ticks whose window had already closed
    TicksLateDropped,
    /// Ticks whose window bounds overflow the timestamp range
    TicksOutOfRange,
    /// Aggregate records emitted
    RecordsEmitted,
    /// Sink write retries
    SinkRetries,
    /// Open windows discarded on shutdown
    WindowsDiscarded,
    /// Feed reconnect attempts
    FeedReconnects,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::TicksReceived => "decaywin_ticks_received_total",
            CounterMetric::TicksMalformed => "decaywin_ticks_malformed_total",
            CounterMetric::TicksLateIncluded => "decaywin_ticks_late_included_total",
            CounterMetric::TicksLateDropped => "decaywin_ticks_late_dropped_total",
            CounterMetric::TicksOutOfRange => "decaywin_ticks_out_of_range_total",
            CounterMetric::RecordsEmitted => "decaywin_records_emitted_total",
            CounterMetric::SinkRetries => "decaywin_sink_retries_total",
            CounterMetric::WindowsDiscarded => "decaywin_windows_discarded_total",
            CounterMetric::FeedReconnects => "decaywin_feed_reconnects_total",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CounterMetric::TicksReceived => "Ticks ingested by the pipeline driver",
            CounterMetric::TicksMalformed => "Raw source lines rejected by the parser",
            CounterMetric::TicksLateIncluded => "Late ticks folded into an open window",
            CounterMetric::TicksLateDropped => "Ticks dropped because their window closed",
            CounterMetric::TicksOutOfRange => "Ticks dropped because their window cannot be represented",
            CounterMetric::RecordsEmitted => "Aggregate records emitted",
            CounterMetric::SinkRetries => "Sink write attempts that were retried",
            CounterMetric::WindowsDiscarded => "Open windows discarded at shutdown",
            CounterMetric::FeedReconnects => "Live feed reconnect attempts",
        }
    }

    const ALL: [CounterMetric; 9] = [
        CounterMetric::TicksReceived,
        CounterMetric::TicksMalformed,
        CounterMetric::TicksLateIncluded,
        CounterMetric::TicksLateDropped,
        CounterMetric::TicksOutOfRange,
        CounterMetric::RecordsEmitted,
        CounterMetric::SinkRetries,
        CounterMetric::WindowsDiscarded,
        CounterMetric::FeedReconnects,
    ];
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Window buffers currently open across all symbols
    OpenWindows,
}

impl GaugeMetric {
    pub fn name(self) -> &'static str {
        match self {
            GaugeMetric::OpenWindows => "decaywin_open_windows",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}

/// Increment a counter by `n`
pub fn increment_by(metric: CounterMetric, n: u64) {
    counter!(metric.name()).increment(n);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Install the Prometheus recorder and serve `/metrics` on `port`
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    for metric in CounterMetric::ALL {
        describe_counter!(metric.name(), metric.description());
    }
    describe_gauge!(
        GaugeMetric::OpenWindows.name(),
        "Window buffers currently open"
    );

    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
