use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters and timings for the uPay integration.
///
/// Every collector is registered on a private registry so the service can expose
/// it on `/metrics` without touching the process-wide default.
#[derive(Clone)]
pub struct UpayMetrics {
    pub registry: Registry,
    pub payment_requests_total: IntCounterVec,
    pub webhook_events_total: IntCounterVec,
    pub confirmation_redirects_total: IntCounterVec,
    pub payment_log_failures: IntCounter,
    pub gateway_latency_seconds: Histogram,
    pub http_errors_total: IntCounterVec,
}

impl UpayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let payment_requests_total = IntCounterVec::new(
            Opts::new("upay_payment_requests_total", "Payment request attempts by outcome"),
            &["outcome"],
        )?;
        let webhook_events_total = IntCounterVec::new(
            Opts::new("upay_webhook_events_total", "Gateway notifications by outcome"),
            &["outcome"],
        )?;
        let confirmation_redirects_total = IntCounterVec::new(
            Opts::new("upay_confirmation_redirects_total", "Shopper returns from the hosted payment page"),
            &["status"],
        )?;
        let payment_log_failures = IntCounter::new(
            "upay_payment_log_failures_total",
            "Durable payment log writes that failed",
        )?;
        let gateway_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "upay_gateway_request_duration_seconds",
                "Round trip time of payment-request calls to the gateway",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
            &["service", "code", "status"],
        )?;
        registry.register(Box::new(payment_requests_total.clone()))?;
        registry.register(Box::new(webhook_events_total.clone()))?;
        registry.register(Box::new(confirmation_redirects_total.clone()))?;
        registry.register(Box::new(payment_log_failures.clone()))?;
        registry.register(Box::new(gateway_latency_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        Ok(UpayMetrics {
            registry,
            payment_requests_total,
            webhook_events_total,
            confirmation_redirects_total,
            payment_log_failures,
            gateway_latency_seconds,
            http_errors_total,
        })
    }

    /// Prometheus text exposition of everything in the registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
