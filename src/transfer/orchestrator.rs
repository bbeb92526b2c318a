//! Bridge orchestrator: sequences step primitives into legs and legs into
//! a round trip

use super::{steps, MintReceipt, Stage, TransferIntent};
use crate::attestation::AttestationClient;
use crate::chain::DomainRegistry;
use crate::config::TransferConfig;
use crate::error::BridgeResult;

use ethers::types::U256;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Result of a completed round trip: one mint receipt per leg
#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub leg_a: MintReceipt,
    pub leg_b: MintReceipt,
}

/// Round-trip phases. Leg B never starts before leg A's mint receipt is
/// confirmed; a failed leg B leaves leg A's mint as a legitimate terminal
/// state, with no rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTripPhase {
    LegA,
    LegB,
    Done,
}

impl RoundTripPhase {
    pub fn advance(self) -> RoundTripPhase {
        match self {
            RoundTripPhase::LegA => RoundTripPhase::LegB,
            RoundTripPhase::LegB | RoundTripPhase::Done => RoundTripPhase::Done,
        }
    }
}

/// Drives one or more directional transfers end-to-end. Independent
/// round trips over disjoint domain pairs share no mutable state and may
/// run concurrently; per-client submission locks are the only
/// serialization.
pub struct BridgeOrchestrator {
    registry: Arc<DomainRegistry>,
    attestation: Arc<AttestationClient>,
    transfer: TransferConfig,
}

impl BridgeOrchestrator {
    pub fn new(
        registry: Arc<DomainRegistry>,
        attestation: Arc<AttestationClient>,
        transfer: TransferConfig,
    ) -> Self {
        Self {
            registry,
            attestation,
            transfer,
        }
    }

    /// Run one directional leg to its terminal mint receipt. Failures are
    /// annotated with the failed stage and, when known, the burn
    /// transaction hash so an operator can resume manually.
    pub async fn run_leg(&self, intent: TransferIntent) -> BridgeResult<MintReceipt> {
        let leg_id = Uuid::new_v4();
        let span = info_span!(
            "leg",
            %leg_id,
            source = intent.source_domain,
            destination = intent.destination_domain,
        );

        async move {
            let started = Instant::now();
            let source = self.registry.get(intent.source_domain)?;
            let destination = self.registry.get(intent.destination_domain)?;

            steps::approve(&source, &intent, self.transfer.approval_multiplier)
                .await
                .map_err(|e| e.at_stage(Stage::Approve, None))?;

            let burn = steps::burn(&source, &intent)
                .await
                .map_err(|e| e.at_stage(Stage::Burn, None))?;
            let burn_hash = format!("{:?}", burn.tx_hash);

            let message = steps::extract_message(&burn)
                .map_err(|e| e.at_stage(Stage::ExtractMessage, Some(burn_hash.clone())))?;

            let attestation = steps::attest(&self.attestation, &message)
                .await
                .map_err(|e| e.at_stage(Stage::Attest, Some(burn_hash.clone())))?;

            let mint = steps::mint(&destination, &message, &attestation)
                .await
                .map_err(|e| e.at_stage(Stage::Mint, Some(burn_hash)))?;

            let elapsed = started.elapsed();
            info!(
                "Leg complete in {:.1}s: minted on domain {} in tx {:?}",
                elapsed.as_secs_f64(),
                intent.destination_domain,
                mint.tx_hash
            );
            crate::metrics::record_leg_completed(elapsed.as_secs_f64());
            Ok(mint)
        }
        .instrument(span)
        .await
        .map_err(|e| {
            crate::metrics::record_leg_failed();
            e
        })
    }

    /// Transfer `amount` from `domain_a` to `domain_b` and back. Leg A
    /// mints to domain B's signer; leg B mints back to domain A's signer.
    pub async fn run_round_trip(
        &self,
        domain_a: u32,
        domain_b: u32,
        amount: U256,
    ) -> BridgeResult<RoundTrip> {
        let signer_a = self.registry.get(domain_a)?.signer_address();
        let signer_b = self.registry.get(domain_b)?.signer_address();

        let mut phase = RoundTripPhase::LegA;

        info!("Round trip: starting leg A ({} -> {})", domain_a, domain_b);
        let leg_a = self
            .run_leg(TransferIntent {
                amount,
                source_domain: domain_a,
                destination_domain: domain_b,
                destination_address: signer_b,
            })
            .await?;
        phase = phase.advance();

        info!("Round trip: starting leg B ({} -> {})", domain_b, domain_a);
        let leg_b = self
            .run_leg(TransferIntent {
                amount,
                source_domain: domain_b,
                destination_domain: domain_a,
                destination_address: signer_a,
            })
            .await?;
        phase = phase.advance();

        debug_assert_eq!(phase, RoundTripPhase::Done);
        Ok(RoundTrip { leg_a, leg_b })
    }

    /// Run the round trip described by the loaded configuration
    pub async fn run_configured_round_trip(&self) -> BridgeResult<RoundTrip> {
        self.run_round_trip(
            self.transfer.source_domain,
            self.transfer.destination_domain,
            U256::from(self.transfer.amount),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_phases_advance_in_order() {
        let mut phase = RoundTripPhase::LegA;

        phase = phase.advance();
        assert_eq!(phase, RoundTripPhase::LegB);

        phase = phase.advance();
        assert_eq!(phase, RoundTripPhase::Done);

        // Terminal state is absorbing
        assert_eq!(phase.advance(), RoundTripPhase::Done);
    }
}
