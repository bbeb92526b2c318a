//! CCTP Courier - burn-attestation-mint transfer orchestration
//!
//! Burns an asset on a source domain, waits for the off-chain attestation
//! service to sign the emitted bridge message, and submits the proof on
//! the destination domain to mint, then runs the reverse leg.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

mod attestation;
mod chain;
mod config;
mod contracts;
mod error;
mod metrics;
mod transfer;

use attestation::AttestationClient;
use chain::DomainRegistry;
use config::Settings;
use metrics::MetricsServer;
use transfer::BridgeOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting CCTP Courier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} domains",
        settings.enabled_domains().len()
    );

    // Connect clients for all enabled domains
    let registry = Arc::new(DomainRegistry::connect(&settings).await?);
    info!("Domain connections initialized");

    // Probe endpoints before committing funds to a leg
    for (domain_id, healthy) in registry.health_check().await {
        if !healthy {
            warn!("Domain {} RPC endpoint is not responding", domain_id);
        }
    }

    // Attestation service client
    let attestation = Arc::new(AttestationClient::new(
        &settings.attestation,
        settings.polling.clone(),
    ));

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let orchestrator =
        BridgeOrchestrator::new(registry, attestation, settings.transfer.clone());

    info!(
        "Running round trip: {} <-> {} (amount {})",
        settings.transfer.source_domain,
        settings.transfer.destination_domain,
        settings.transfer.amount
    );

    let outcome = orchestrator.run_configured_round_trip().await;

    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    match outcome {
        Ok(round_trip) => {
            info!(
                "Round trip complete: leg A mint {:?} (block {}), leg B mint {:?} (block {})",
                round_trip.leg_a.tx_hash,
                round_trip.leg_a.block_number,
                round_trip.leg_b.tx_hash,
                round_trip.leg_b.block_number
            );
            Ok(())
        }
        Err(e) => {
            if let Some(stage) = e.failed_stage() {
                error!("Round trip failed at the {} stage: {}", stage, e);
            } else {
                error!("Round trip failed: {}", e);
            }
            Err(e.into())
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cctp_courier=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
