//! Observability - tracing subscriber setup and Prometheus metrics.

use crate::config::LoggingConfig;
use once_cell::sync::Lazy;
use prometheus::{histogram_opts, opts, Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use tracing_subscriber::EnvFilter;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        opts!("clinic_requests_total", "Total HTTP requests handled"),
        &["method", "status"],
    )
    .expect("valid metric definition");
    REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

pub static HTTP_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let hist = HistogramVec::new(
        histogram_opts!("clinic_request_duration_seconds", "HTTP request latencies"),
        &["method"],
    )
    .expect("valid metric definition");
    REGISTRY.register(Box::new(hist.clone())).ok();
    hist
});

pub static AUTH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        opts!("clinic_auth_failures_total", "Rejected bearer tokens by failure kind"),
        &["kind"],
    )
    .expect("valid metric definition");
    REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

pub static CACHE_UNAVAILABLE: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "clinic_cache_unavailable_total",
        "Cache operations that failed or timed out",
    )
    .expect("valid metric definition");
    REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level`. `logging.format = "json"` switches to
/// structured JSON lines. Calling this twice is harmless.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let result = if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Return metrics as text/plain for Prometheus
pub fn gather_metrics() -> String {
    // touch the statics so every family shows up even before first use
    Lazy::force(&HTTP_REQUESTS);
    Lazy::force(&HTTP_LATENCY);
    Lazy::force(&AUTH_FAILURES);
    Lazy::force(&CACHE_UNAVAILABLE);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    let mf = REGISTRY.gather();
    if let Err(err) = encoder.encode(&mf, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_exposed() {
        AUTH_FAILURES.with_label_values(&["expired_token"]).inc();
        CACHE_UNAVAILABLE.inc();
        let text = gather_metrics();
        assert!(text.contains("clinic_auth_failures_total"));
        assert!(text.contains("clinic_cache_unavailable_total"));
    }
}
