//! Transfer module - the burn-attestation-mint state machine
//!
//! One directional transfer (a "leg") walks five strictly sequential
//! stages; a round trip is two legs with swapped domains. Each stage's
//! output is the next stage's required input, so nothing is skipped,
//! reordered, or parallelized within a leg.

pub mod orchestrator;
pub mod steps;

pub use orchestrator::{BridgeOrchestrator, RoundTrip};

use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use ethers::utils::keccak256;
use std::fmt;

/// The five per-leg stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Approve,
    Burn,
    ExtractMessage,
    Attest,
    Mint,
}

impl Stage {
    /// Stage following this one, or `None` after the terminal mint
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Approve => Some(Stage::Burn),
            Stage::Burn => Some(Stage::ExtractMessage),
            Stage::ExtractMessage => Some(Stage::Attest),
            Stage::Attest => Some(Stage::Mint),
            Stage::Mint => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Approve => "approve",
            Stage::Burn => "burn",
            Stage::ExtractMessage => "extract-message",
            Stage::Attest => "attest",
            Stage::Mint => "mint",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directional transfer request. Consumed by a single leg run.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    pub amount: U256,
    pub source_domain: u32,
    pub destination_domain: u32,
    /// Mint recipient on the destination domain
    pub destination_address: Address,
}

/// Mined burn transaction plus its logs, consumed by message extraction
#[derive(Debug, Clone)]
pub struct BurnReceipt {
    pub tx_hash: H256,
    pub receipt: TransactionReceipt,
}

/// Canonical byte encoding of one burn event. The keccak256 of the bytes
/// is the attestation lookup key. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    bytes: Bytes,
    hash: H256,
}

impl BridgeMessage {
    pub fn new(bytes: Bytes) -> Self {
        let hash = H256::from(keccak256(&bytes));
        Self { bytes, hash }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Signature issued by the attestation service over a message hash
#[derive(Debug, Clone)]
pub struct Attestation {
    signature: Bytes,
}

impl Attestation {
    pub fn new(signature: Bytes) -> Self {
        Self { signature }
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }
}

/// Terminal artifact of a successful leg
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering_is_fixed() {
        let mut order = vec![Stage::Approve];
        while let Some(next) = order.last().unwrap().next() {
            order.push(next);
        }
        assert_eq!(
            order,
            vec![
                Stage::Approve,
                Stage::Burn,
                Stage::ExtractMessage,
                Stage::Attest,
                Stage::Mint,
            ]
        );
    }

    #[test]
    fn test_stage_display_names() {
        assert_eq!(Stage::ExtractMessage.to_string(), "extract-message");
        assert_eq!(Stage::Mint.to_string(), "mint");
    }

    #[test]
    fn test_bridge_message_hash_is_keccak_of_bytes() {
        let payload = Bytes::from(b"burn message".to_vec());
        let message = BridgeMessage::new(payload.clone());

        assert_eq!(message.bytes(), &payload);
        assert_eq!(message.hash(), H256::from(keccak256(&payload)));

        // Same bytes always produce the same key
        let again = BridgeMessage::new(payload);
        assert_eq!(message, again);
    }
}
