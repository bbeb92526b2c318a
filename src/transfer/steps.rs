//! Step primitives: one idempotent-intent network interaction each
//!
//! Every async step blocks until its interaction reaches a stable,
//! observable outcome (mined receipt or complete attestation) before the
//! orchestrator advances.

use super::{Attestation, BridgeMessage, BurnReceipt, MintReceipt, TransferIntent};
use crate::attestation::AttestationClient;
use crate::chain::ChainClient;
use crate::contracts;
use crate::error::{BridgeError, BridgeResult};

use ethers::types::{TransactionReceipt, U256};
use tracing::info;

/// Authorize the source token messenger to pull the transfer amount.
/// The allowance is `amount * multiplier` so a manually resumed leg does
/// not need a fresh approval.
pub async fn approve(
    source: &ChainClient,
    intent: &TransferIntent,
    approval_multiplier: u64,
) -> BridgeResult<TransactionReceipt> {
    let allowance = intent.amount * U256::from(approval_multiplier);
    let spender = source.contracts().token_messenger;

    info!(
        "Approving {} for messenger {:?} on domain {}",
        allowance,
        spender,
        source.domain_id()
    );
    let receipt = source.approve(spender, allowance).await?;
    crate::metrics::record_stage_completed(super::Stage::Approve);
    Ok(receipt)
}

/// Burn the asset on the source domain via `depositForBurn`
pub async fn burn(source: &ChainClient, intent: &TransferIntent) -> BridgeResult<BurnReceipt> {
    let recipient = contracts::address_to_bytes32(intent.destination_address);
    let calldata = contracts::encode_deposit_for_burn(
        intent.amount,
        intent.destination_domain,
        recipient,
        source.contracts().token,
    );

    let tx_hash = source
        .submit_transaction(source.contracts().token_messenger, calldata)
        .await?;
    info!(
        "Burn submitted on domain {}: {:?}",
        source.domain_id(),
        tx_hash
    );

    let receipt = source.wait_for_receipt(tx_hash).await?;
    crate::metrics::record_stage_completed(super::Stage::Burn);
    Ok(BurnReceipt { tx_hash, receipt })
}

/// Extract the bridge message from the burn receipt's `MessageSent` log.
/// Deterministic over a fixed receipt; a missing log is fatal since a
/// retry cannot produce a different log set.
pub fn extract_message(burn: &BurnReceipt) -> BridgeResult<BridgeMessage> {
    let log = contracts::find_message_sent_log(&burn.receipt).ok_or_else(|| {
        BridgeError::MessageNotFound {
            tx_hash: format!("{:?}", burn.tx_hash),
        }
    })?;

    let bytes = contracts::decode_message_sent(log)?;
    let message = BridgeMessage::new(bytes);
    info!("Extracted message with hash {:?}", message.hash());
    crate::metrics::record_stage_completed(super::Stage::ExtractMessage);
    Ok(message)
}

/// Wait for the attestation service to sign the message hash
pub async fn attest(
    client: &AttestationClient,
    message: &BridgeMessage,
) -> BridgeResult<Attestation> {
    let signature = client.get_attestation(message.hash()).await?;
    crate::metrics::record_stage_completed(super::Stage::Attest);
    Ok(Attestation::new(signature))
}

/// Submit the message and attestation to the destination message
/// transmitter. A revert here (replay, bad signature) is `MintRejected`.
pub async fn mint(
    destination: &ChainClient,
    message: &BridgeMessage,
    attestation: &Attestation,
) -> BridgeResult<MintReceipt> {
    let calldata = contracts::encode_receive_message(message.bytes(), attestation.signature());

    let tx_hash = destination
        .submit_transaction(destination.contracts().message_transmitter, calldata)
        .await?;
    info!(
        "Mint submitted on domain {}: {:?}",
        destination.domain_id(),
        tx_hash
    );

    let receipt = destination
        .wait_for_receipt(tx_hash)
        .await
        .map_err(classify_mint_error)?;

    crate::metrics::record_stage_completed(super::Stage::Mint);
    Ok(MintReceipt {
        tx_hash,
        block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
    })
}

/// A destination-side revert of `receiveMessage` means the contract
/// rejected the mint (replay, invalid signature, attestation mismatch);
/// every other failure keeps its own kind.
fn classify_mint_error(e: BridgeError) -> BridgeError {
    match e {
        BridgeError::TransactionReverted { tx_hash } => BridgeError::MintRejected {
            tx_hash,
            reason: "destination contract reverted receiveMessage".into(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::MESSAGE_SENT_TOPIC;
    use ethers::abi::{self, Token};
    use ethers::types::{Bytes, Log, H256};
    use ethers::utils::keccak256;

    fn burn_receipt_with_logs(logs: Vec<Log>) -> BurnReceipt {
        BurnReceipt {
            tx_hash: H256::from(keccak256(b"burn tx")),
            receipt: TransactionReceipt {
                logs,
                ..Default::default()
            },
        }
    }

    fn message_sent_log(payload: &[u8]) -> Log {
        Log {
            topics: vec![*MESSAGE_SENT_TOPIC],
            data: Bytes::from(abi::encode(&[Token::Bytes(payload.to_vec())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_message_from_burn_receipt() {
        let payload = b"leg-a message".to_vec();
        let burn = burn_receipt_with_logs(vec![message_sent_log(&payload)]);

        let message = extract_message(&burn).unwrap();
        assert_eq!(message.bytes().to_vec(), payload);
        assert_eq!(message.hash(), H256::from(keccak256(&payload)));
    }

    #[test]
    fn test_extract_message_is_deterministic() {
        let burn = burn_receipt_with_logs(vec![message_sent_log(b"fixed")]);
        let first = extract_message(&burn).unwrap();
        let second = extract_message(&burn).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_burn_without_message_sent_log_is_fatal() {
        let unrelated = Log {
            topics: vec![H256::from(keccak256(b"Transfer(address,address,uint256)"))],
            ..Default::default()
        };
        let burn = burn_receipt_with_logs(vec![unrelated]);

        let err = extract_message(&burn).unwrap_err();
        assert!(matches!(err, BridgeError::MessageNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_extract_message_with_empty_log_set_is_fatal() {
        let burn = burn_receipt_with_logs(Vec::new());
        assert!(matches!(
            extract_message(&burn),
            Err(BridgeError::MessageNotFound { .. })
        ));
    }

    #[test]
    fn test_destination_revert_becomes_mint_rejected() {
        let reverted = BridgeError::TransactionReverted {
            tx_hash: "0xbeef".into(),
        };

        match classify_mint_error(reverted) {
            BridgeError::MintRejected { tx_hash, reason } => {
                assert_eq!(tx_hash, "0xbeef");
                assert!(reason.contains("receiveMessage"));
            }
            other => panic!("expected MintRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_other_mint_failures_keep_their_kind() {
        let timeout = classify_mint_error(BridgeError::Timeout {
            operation: "receipt for 0xbeef on domain 1".into(),
        });
        assert!(matches!(timeout, BridgeError::Timeout { .. }));

        let broadcast = classify_mint_error(BridgeError::Broadcast("rpc down".into()));
        assert!(matches!(broadcast, BridgeError::Broadcast(_)));
    }
}
