//! Error types for the courier

use thiserror::Error;

use crate::transfer::Stage;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error for domain {domain_id}: {message}")]
    ChainConnection { domain_id: u32, message: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Transaction {tx_hash} reverted on chain")]
    TransactionReverted { tx_hash: String },

    #[error("No MessageSent log in transaction {tx_hash}")]
    MessageNotFound { tx_hash: String },

    #[error("Attestation service error: {0}")]
    AttestationService(String),

    #[error("Mint rejected for transaction {tx_hash}: {reason}")]
    MintRejected { tx_hash: String, reason: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Domain {domain_id} not found")]
    DomainNotFound { domain_id: u32 },

    #[error("Transfer failed at {stage} stage{}: {source}", tx_context(.tx_hash))]
    Transfer {
        stage: Stage,
        tx_hash: Option<String>,
        #[source]
        source: Box<BridgeError>,
    },
}

fn tx_context(tx_hash: &Option<String>) -> String {
    match tx_hash {
        Some(hash) => format!(" (last tx {})", hash),
        None => String::new(),
    }
}

impl BridgeError {
    /// Check if error is retryable within a polling loop
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::ChainConnection { .. } | BridgeError::Timeout { .. }
        )
    }

    /// Wrap an error with the stage it occurred in, keeping the last
    /// observed transaction hash for manual resumption.
    pub fn at_stage(self, stage: Stage, tx_hash: Option<String>) -> Self {
        match self {
            // Already annotated by an inner step
            BridgeError::Transfer { .. } => self,
            other => BridgeError::Transfer {
                stage,
                tx_hash,
                source: Box::new(other),
            },
        }
    }

    /// The stage a wrapped transfer error failed at, if annotated
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            BridgeError::Transfer { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transient = BridgeError::ChainConnection {
            domain_id: 0,
            message: "connection reset".into(),
        };
        assert!(transient.is_retryable());

        let fatal = BridgeError::MessageNotFound {
            tx_hash: "0xabc".into(),
        };
        assert!(!fatal.is_retryable());

        let rejected = BridgeError::MintRejected {
            tx_hash: "0xabc".into(),
            reason: "Nonce already used".into(),
        };
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_stage_annotation() {
        let err = BridgeError::GasEstimation("out of gas".into())
            .at_stage(Stage::Burn, Some("0xdead".into()));

        assert_eq!(err.failed_stage(), Some(Stage::Burn));
        let rendered = err.to_string();
        assert!(rendered.contains("burn"));
        assert!(rendered.contains("0xdead"));
    }

    #[test]
    fn test_stage_annotation_is_not_double_wrapped() {
        let err = BridgeError::Broadcast("rpc down".into())
            .at_stage(Stage::Mint, None)
            .at_stage(Stage::Attest, None);

        assert_eq!(err.failed_stage(), Some(Stage::Mint));
    }
}
