//! Calldata encoding and event decoding for the four consumed contract
//! surfaces: token `approve`, token messenger `depositForBurn`, message
//! transmitter `receiveMessage`, and the `MessageSent(bytes)` event.
//!
//! Selectors and the event topic are hashed once at startup and shared
//! across steps.

use crate::error::{BridgeError, BridgeResult};

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256};
use ethers::utils::keccak256;
use lazy_static::lazy_static;

lazy_static! {
    /// Topic of the sole event consumed: `MessageSent(bytes)`
    pub static ref MESSAGE_SENT_TOPIC: H256 =
        H256::from(keccak256("MessageSent(bytes)".as_bytes()));

    static ref APPROVE_SELECTOR: [u8; 4] = selector("approve(address,uint256)");
    static ref DEPOSIT_FOR_BURN_SELECTOR: [u8; 4] =
        selector("depositForBurn(uint256,uint32,bytes32,address)");
    static ref RECEIVE_MESSAGE_SELECTOR: [u8; 4] = selector("receiveMessage(bytes,bytes)");
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn encode_call(sel: &[u8; 4], tokens: &[Token]) -> Bytes {
    let mut data = sel.to_vec();
    data.extend_from_slice(&abi::encode(tokens));
    Bytes::from(data)
}

/// Calldata for `approve(spender, amount)`
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    encode_call(
        &APPROVE_SELECTOR,
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

/// Calldata for `depositForBurn(amount, destinationDomain, mintRecipient, burnToken)`
pub fn encode_deposit_for_burn(
    amount: U256,
    destination_domain: u32,
    mint_recipient: [u8; 32],
    burn_token: Address,
) -> Bytes {
    encode_call(
        &DEPOSIT_FOR_BURN_SELECTOR,
        &[
            Token::Uint(amount),
            Token::Uint(U256::from(destination_domain)),
            Token::FixedBytes(mint_recipient.to_vec()),
            Token::Address(burn_token),
        ],
    )
}

/// Calldata for `receiveMessage(message, attestation)`
pub fn encode_receive_message(message: &Bytes, attestation: &Bytes) -> Bytes {
    encode_call(
        &RECEIVE_MESSAGE_SELECTOR,
        &[
            Token::Bytes(message.to_vec()),
            Token::Bytes(attestation.to_vec()),
        ],
    )
}

/// Convert a native address to the 32-byte representation the message
/// contract expects. Pure; mirrors on-chain `Message.addressToBytes32`.
pub fn address_to_bytes32(addr: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_bytes());
    out
}

/// Find the `MessageSent` log in a mined receipt
pub fn find_message_sent_log(receipt: &TransactionReceipt) -> Option<&Log> {
    receipt
        .logs
        .iter()
        .find(|log| log.topics.first() == Some(&*MESSAGE_SENT_TOPIC))
}

/// ABI-decode the single `bytes` parameter of a `MessageSent` log
pub fn decode_message_sent(log: &Log) -> BridgeResult<Bytes> {
    let tokens = abi::decode(&[ParamType::Bytes], &log.data).map_err(|_| {
        BridgeError::MessageNotFound {
            tx_hash: format!("{:?}", log.transaction_hash.unwrap_or_default()),
        }
    })?;

    match tokens.into_iter().next() {
        Some(Token::Bytes(bytes)) => Ok(Bytes::from(bytes)),
        _ => Err(BridgeError::MessageNotFound {
            tx_hash: format!("{:?}", log.transaction_hash.unwrap_or_default()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_sent_topic_matches_known_hash() {
        // keccak256("MessageSent(bytes)")
        let expected: H256 = "0x8c5261668696ce22758910d05bab8f186d6eb247ceac2af2e82c7dc17669b036"
            .parse()
            .unwrap();
        assert_eq!(*MESSAGE_SENT_TOPIC, expected);
    }

    #[test]
    fn test_approve_selector_matches_erc20() {
        assert_eq!(*APPROVE_SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn test_approve_calldata_layout() {
        let spender: Address = "0x0273f0bd27c2c6c11213e55463d07c1722e8cdc3"
            .parse()
            .unwrap();
        let data = encode_approve(spender, U256::from(10u64));

        // selector + two 32-byte words
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[0..4], &*APPROVE_SELECTOR);
        // address is right-aligned in its word
        assert_eq!(&data[4 + 12..4 + 32], spender.as_bytes());
        assert_eq!(data[4 + 63], 10);
    }

    #[test]
    fn test_deposit_for_burn_calldata_layout() {
        let token: Address = "0x07865c6e87b9f70255377e024ace6630c1eaa37f"
            .parse()
            .unwrap();
        let recipient = [0xabu8; 32];
        let data = encode_deposit_for_burn(U256::from(1u64), 1, recipient, token);

        assert_eq!(data.len(), 4 + 4 * 32);
        assert_eq!(&data[0..4], &keccak256(b"depositForBurn(uint256,uint32,bytes32,address)")[0..4]);
        // amount word
        assert_eq!(data[4 + 31], 1);
        // destination domain word
        assert_eq!(data[4 + 63], 1);
        // mint recipient occupies the full third word
        assert_eq!(&data[4 + 64..4 + 96], &recipient);
    }

    #[test]
    fn test_address_to_bytes32_is_pure_and_left_padded() {
        let addr: Address = "0x5425890298aed601595a70ab815c96711a31bc65"
            .parse()
            .unwrap();

        let first = address_to_bytes32(addr);
        let second = address_to_bytes32(addr);
        assert_eq!(first, second);
        assert_eq!(&first[0..12], &[0u8; 12]);
        assert_eq!(&first[12..], addr.as_bytes());
    }

    fn message_sent_log(payload: &[u8]) -> Log {
        Log {
            topics: vec![*MESSAGE_SENT_TOPIC],
            data: Bytes::from(abi::encode(&[Token::Bytes(payload.to_vec())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_message_sent_round_trip() {
        let payload = b"burn message payload".to_vec();
        let log = message_sent_log(&payload);

        let decoded = decode_message_sent(&log).unwrap();
        assert_eq!(decoded.to_vec(), payload);
    }

    #[test]
    fn test_decode_message_sent_is_deterministic() {
        let log = message_sent_log(b"fixed payload");
        let first = decode_message_sent(&log).unwrap();
        let second = decode_message_sent(&log).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_message_sent_log_ignores_other_events() {
        let other = Log {
            topics: vec![H256::from(keccak256(b"Transfer(address,address,uint256)"))],
            ..Default::default()
        };
        let wanted = message_sent_log(b"payload");

        let receipt = TransactionReceipt {
            logs: vec![other.clone(), wanted.clone()],
            ..Default::default()
        };
        let found = find_message_sent_log(&receipt).unwrap();
        assert_eq!(found.data, wanted.data);

        let receipt_without = TransactionReceipt {
            logs: vec![other],
            ..Default::default()
        };
        assert!(find_message_sent_log(&receipt_without).is_none());
    }
}
