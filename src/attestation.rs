//! Attestation service client
//!
//! Polls the off-chain attestation API for the signature over a burn
//! message hash. "pending" is not an error: the service signs only after
//! it has observed and finalized the burn, so the client keeps polling
//! until the response status is "complete" or the deadline passes.

use crate::config::{AttestationConfig, PollingConfig};
use crate::error::{BridgeError, BridgeResult};

use ethers::types::{Bytes, H256};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Wire format of `GET {base_url}/attestations/{message_hash}`
#[derive(Debug, Clone, Deserialize)]
pub struct AttestationResponse {
    pub status: String,
    pub attestation: Option<String>,
}

/// Client for the attestation HTTP API
pub struct AttestationClient {
    http: reqwest::Client,
    base_url: String,
    polling: PollingConfig,
}

impl AttestationClient {
    pub fn new(config: &AttestationConfig, polling: PollingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            polling,
        }
    }

    /// Block until the service reports a complete attestation for
    /// `message_hash`, returning the signature bytes. Times out after the
    /// configured deadline.
    pub async fn get_attestation(&self, message_hash: H256) -> BridgeResult<Bytes> {
        let url = format!("{}/attestations/{:?}", self.base_url, message_hash);
        let interval = Duration::from_millis(self.polling.attestation_interval_ms);
        let max_backoff = Duration::from_millis(self.polling.max_backoff_ms);
        let deadline =
            Instant::now() + Duration::from_secs(self.polling.attestation_timeout_secs);
        let mut backoff = interval;

        loop {
            match self.poll_once(&url).await {
                Ok(Some(signature)) => {
                    debug!(
                        "Attestation complete for {:?} ({} bytes)",
                        message_hash,
                        signature.len()
                    );
                    return Ok(signature);
                }
                Ok(None) => {
                    backoff = interval;
                }
                Err(PollError::Transient(reason)) => {
                    warn!("Attestation poll error for {:?}: {}", message_hash, reason);
                    backoff = grow_backoff(backoff, max_backoff);
                }
                Err(PollError::Fatal(e)) => return Err(e),
            }

            crate::metrics::record_attestation_poll();

            if Instant::now() + backoff >= deadline {
                return Err(BridgeError::Timeout {
                    operation: format!("attestation for {:?}", message_hash),
                });
            }
            tokio::time::sleep(with_jitter(backoff)).await;
        }
    }

    /// One poll. `Ok(None)` means keep polling; transport blips and server
    /// errors are transient so the loop backs off instead of aborting.
    async fn poll_once(&self, url: &str) -> Result<Option<Bytes>, PollError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PollError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // The service has not indexed the message yet
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(PollError::Transient(format!("service returned {}", status)));
        }
        if !status.is_success() {
            return Err(PollError::Fatal(BridgeError::AttestationService(format!(
                "unexpected HTTP status {}",
                status
            ))));
        }

        let body: AttestationResponse = response.json().await.map_err(|e| {
            PollError::Fatal(BridgeError::AttestationService(format!(
                "malformed response: {}",
                e
            )))
        })?;

        evaluate(body).map_err(PollError::Fatal)
    }
}

/// Outcome classification for a single poll attempt
enum PollError {
    Transient(String),
    Fatal(BridgeError),
}

/// Decide whether a well-formed response completes the wait.
/// "pending" and unrecognized statuses mean keep polling; a "complete"
/// response must carry a decodable, non-empty signature.
fn evaluate(response: AttestationResponse) -> BridgeResult<Option<Bytes>> {
    if response.status != "complete" {
        return Ok(None);
    }

    let encoded = response
        .attestation
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            BridgeError::AttestationService("complete response without attestation".into())
        })?;

    let raw = hex::decode(encoded.trim_start_matches("0x")).map_err(|e| {
        BridgeError::AttestationService(format!("attestation is not valid hex: {}", e))
    })?;

    Ok(Some(Bytes::from(raw)))
}

fn grow_backoff(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current * 2, max)
}

fn with_jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.85..1.15);
    base.mul_f64(factor)
}
