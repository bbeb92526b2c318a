//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Stage completions and failures
//! - Leg completions and latency
//! - Polling activity against chains and the attestation service

use crate::error::BridgeResult;
use crate::transfer::Stage;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Domain metrics
    pub static ref DOMAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "courier_domain_connected",
        "Domain RPC status (1=reachable, 0=unreachable)",
        &["domain_id"]
    ).unwrap();

    // Stage metrics
    pub static ref STAGES_COMPLETED: CounterVec = register_counter_vec!(
        "courier_stages_completed_total",
        "Total stages completed by stage name",
        &["stage"]
    ).unwrap();

    // Leg metrics
    pub static ref LEGS_COMPLETED: CounterVec = register_counter_vec!(
        "courier_legs_completed_total",
        "Total legs run to a mint receipt",
        &[]
    ).unwrap();

    pub static ref LEGS_FAILED: CounterVec = register_counter_vec!(
        "courier_legs_failed_total",
        "Total legs aborted with an error",
        &[]
    ).unwrap();

    pub static ref LEG_LATENCY: HistogramVec = register_histogram_vec!(
        "courier_leg_latency_seconds",
        "End-to-end leg latency from approve to mint receipt",
        &[],
        vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]
    ).unwrap();

    // Polling metrics
    pub static ref RECEIPT_POLLS: CounterVec = register_counter_vec!(
        "courier_receipt_polls_total",
        "Total receipt poll attempts per domain",
        &["domain_id"]
    ).unwrap();

    pub static ref ATTESTATION_POLLS: CounterVec = register_counter_vec!(
        "courier_attestation_polls_total",
        "Total attestation service poll attempts",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> BridgeResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_domain_health(domain_id: u32, healthy: bool) {
    DOMAIN_CONNECTED
        .with_label_values(&[&domain_id.to_string()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_stage_completed(stage: Stage) {
    STAGES_COMPLETED.with_label_values(&[stage.as_str()]).inc();
}

pub fn record_leg_completed(latency_secs: f64) {
    LEGS_COMPLETED.with_label_values(&[]).inc();
    LEG_LATENCY.with_label_values(&[]).observe(latency_secs);
}

pub fn record_leg_failed() {
    LEGS_FAILED.with_label_values(&[]).inc();
}

pub fn record_receipt_poll(domain_id: u32) {
    RECEIPT_POLLS
        .with_label_values(&[&domain_id.to_string()])
        .inc();
}

pub fn record_attestation_poll() {
    ATTESTATION_POLLS.with_label_values(&[]).inc();
}
