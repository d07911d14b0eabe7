//! # Prometheus Metrics
//!
//! Flow counters and latency, scraped at `/metrics` on the metrics port.
//! Everything lives in a dedicated [`Registry`] with the `obligation` prefix.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use obligation_flows::FlowError;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Flows started, by flow name.
    pub flows_started_total: IntCounterVec,
    /// Flows that reached Done, by flow name.
    pub flows_completed_total: IntCounterVec,
    /// Flows that aborted, by flow name and error category.
    pub flows_failed_total: IntCounterVec,
    /// Wall time from start to outcome, by flow name.
    pub flow_latency_seconds: HistogramVec,
    /// Parties hosted by this process.
    pub parties: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("obligation".into()), None)?;

        let flows_started_total = IntCounterVec::new(
            Opts::new("flows_started_total", "Flows started"),
            &["flow"],
        )?;
        let flows_completed_total = IntCounterVec::new(
            Opts::new("flows_completed_total", "Flows that recorded a transaction"),
            &["flow"],
        )?;
        let flows_failed_total = IntCounterVec::new(
            Opts::new("flows_failed_total", "Flows that aborted, by error category"),
            &["flow", "category"],
        )?;
        let flow_latency_seconds = HistogramVec::new(
            HistogramOpts::new("flow_latency_seconds", "Flow latency in seconds").buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["flow"],
        )?;
        let parties = IntGauge::new("parties", "Parties hosted by this process")?;

        registry.register(Box::new(flows_started_total.clone()))?;
        registry.register(Box::new(flows_completed_total.clone()))?;
        registry.register(Box::new(flows_failed_total.clone()))?;
        registry.register(Box::new(flow_latency_seconds.clone()))?;
        registry.register(Box::new(parties.clone()))?;

        Ok(Self {
            registry,
            flows_started_total,
            flows_completed_total,
            flows_failed_total,
            flow_latency_seconds,
            parties,
        })
    }

    /// Marks a flow as started. Pass the returned instant to [`Self::finished`].
    pub fn started(&self, flow: &str) -> Instant {
        self.flows_started_total.with_label_values(&[flow]).inc();
        Instant::now()
    }

    pub fn finished<T>(&self, flow: &str, started: Instant, outcome: &Result<T, FlowError>) {
        self.flow_latency_seconds
            .with_label_values(&[flow])
            .observe(started.elapsed().as_secs_f64());
        match outcome {
            Ok(_) => self.flows_completed_total.with_label_values(&[flow]).inc(),
            Err(e) => self
                .flows_failed_total
                .with_label_values(&[flow, e.category().as_str()])
                .inc(),
        }
    }

    /// All registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics`
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
