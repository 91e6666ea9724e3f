use std::sync::OnceLock;
use std::time::Duration;

use chipline_models::{ExtractionLog, ExtractionStatus};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

struct Metrics {
    extraction_files: IntCounterVec,
    refresh_seconds: Histogram,
}

impl Metrics {
    fn register() -> prometheus::Result<Self> {
        let extraction_files = IntCounterVec::new(
            Opts::new("chipline_extraction_files_total", "Supplier files processed, by outcome"),
            &["supplier", "status"],
        )?;
        let refresh_seconds = Histogram::with_opts(
            HistogramOpts::new("chipline_refresh_seconds", "Wall time of one full refresh")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        prometheus::register(Box::new(extraction_files.clone()))?;
        prometheus::register(Box::new(refresh_seconds.clone()))?;
        Ok(Self {
            extraction_files,
            refresh_seconds,
        })
    }
}

fn metrics() -> Option<&'static Metrics> {
    static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();
    METRICS
        .get_or_init(|| match Metrics::register() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                tracing::warn!(error = %e, "metrics registration failed");
                None
            }
        })
        .as_ref()
}

fn status_label(status: ExtractionStatus) -> &'static str {
    match status {
        ExtractionStatus::Success => "success",
        ExtractionStatus::Error => "error",
        ExtractionStatus::Skipped => "skipped",
    }
}

pub fn record_refresh(log: &ExtractionLog, elapsed: Duration) {
    let Some(metrics) = metrics() else {
        return;
    };
    for entry in log.entries() {
        metrics
            .extraction_files
            .with_label_values(&[entry.supplier.label(), status_label(entry.status)])
            .inc();
    }
    metrics.refresh_seconds.observe(elapsed.as_secs_f64());
}

/// Prometheus text exposition of the default registry.
pub fn render() -> String {
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_else(|_| "Error encoding metrics".to_string())
}
