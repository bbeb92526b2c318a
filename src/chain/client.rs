//! Single-domain chain client: transaction submission, receipt polling,
//! and log retrieval against one RPC endpoint with one signing identity.

use crate::config::{DomainConfig, PollingConfig};
use crate::contracts;
use crate::error::{BridgeError, BridgeResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Contract addresses dialed on one domain. The message contract stays in
/// the configuration surface but is never called: its only consumed method,
/// `addressToBytes32`, is a pure conversion done locally.
#[derive(Debug, Clone)]
pub struct DomainContracts {
    pub token: Address,
    pub token_messenger: Address,
    pub message_transmitter: Address,
}

/// Client for one participating domain
pub struct ChainClient {
    domain_id: u32,
    provider: Provider<Http>,
    wallet: LocalWallet,
    contracts: DomainContracts,
    polling: PollingConfig,
    /// Serializes submissions for this signer to avoid nonce collisions
    /// when the client is shared across concurrent transfers
    submit_lock: Mutex<()>,
}

impl ChainClient {
    /// Connect to a domain's RPC endpoint and bind the signing identity
    pub async fn connect(config: &DomainConfig, polling: PollingConfig) -> BridgeResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| BridgeError::ChainConnection {
                domain_id: config.domain_id,
                message: format!("Invalid RPC URL: {}", e),
            })?
            .interval(Duration::from_millis(100));

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| BridgeError::ChainConnection {
                domain_id: config.domain_id,
                message: e.to_string(),
            })?;

        let wallet = config
            .private_key
            .parse::<LocalWallet>()
            .map_err(|e| BridgeError::Wallet(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain_id.as_u64());

        let contracts = DomainContracts {
            token: parse_address(&config.token_address, config.domain_id)?,
            token_messenger: parse_address(&config.token_messenger_address, config.domain_id)?,
            message_transmitter: parse_address(
                &config.message_transmitter_address,
                config.domain_id,
            )?,
        };

        debug!(
            "Domain {} ({}) connected (chain id {}, signer {:?})",
            config.domain_id,
            config.name,
            chain_id,
            wallet.address()
        );

        Ok(Self {
            domain_id: config.domain_id,
            provider,
            wallet,
            contracts,
            polling,
            submit_lock: Mutex::new(()),
        })
    }

    pub fn domain_id(&self) -> u32 {
        self.domain_id
    }

    /// Address of this domain's signer
    pub fn signer_address(&self) -> Address {
        self.wallet.address()
    }

    pub fn contracts(&self) -> &DomainContracts {
        &self.contracts
    }

    /// Current head block number
    pub async fn get_block_number(&self) -> BridgeResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map(|b| b.as_u64())
            .map_err(|e| self.connection_error(e))
    }

    /// Authorize `spender` to move `amount` of this domain's asset token.
    /// Blocks until the approval transaction is mined.
    pub async fn approve(&self, spender: Address, amount: U256) -> BridgeResult<TransactionReceipt> {
        let calldata = contracts::encode_approve(spender, amount);
        let tx_hash = self.submit_transaction(self.contracts.token, calldata).await?;
        self.wait_for_receipt(tx_hash).await
    }

    /// Estimate gas, sign, and broadcast a call to `to`. Submissions are
    /// serialized per signer so nonces are allocated in order.
    pub async fn submit_transaction(&self, to: Address, calldata: Bytes) -> BridgeResult<H256> {
        let _guard = self.submit_lock.lock().await;

        let from = self.wallet.address();
        let nonce = self
            .provider
            .get_transaction_count(from, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| self.connection_error(e))?;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .data(calldata)
            .nonce(nonce)
            .into();

        let gas = self
            .provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| BridgeError::GasEstimation(e.to_string()))?;
        // 20% headroom over the estimate
        tx.set_gas(gas + gas / 5);

        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BridgeError::GasEstimation(e.to_string()))?;
        tx.set_gas_price(gas_price);

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| BridgeError::Wallet(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| BridgeError::Broadcast(e.to_string()))?;
        let tx_hash = pending.tx_hash();

        debug!(
            "Domain {} submitted tx {:?} (nonce {})",
            self.domain_id, tx_hash, nonce
        );
        Ok(tx_hash)
    }

    /// Poll until `tx_hash` has a mined receipt, or the configured deadline
    /// passes. Transient RPC errors back off and retry; a status-0 receipt
    /// is a revert. Re-polling an already-mined hash returns the same
    /// receipt: receipts are append-only once mined.
    pub async fn wait_for_receipt(&self, tx_hash: H256) -> BridgeResult<TransactionReceipt> {
        let interval = Duration::from_millis(self.polling.receipt_interval_ms);
        let max_backoff = Duration::from_millis(self.polling.max_backoff_ms);
        let deadline = Instant::now() + Duration::from_secs(self.polling.receipt_timeout_secs);
        let mut backoff = interval;

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.block_number.is_some() => {
                    if receipt.status == Some(0.into()) {
                        return Err(BridgeError::TransactionReverted {
                            tx_hash: format!("{:?}", tx_hash),
                        });
                    }
                    return Ok(receipt);
                }
                Ok(_) => {
                    // Not mined yet, plain interval
                    backoff = interval;
                }
                Err(e) => {
                    let err = self.connection_error(e);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    warn!(
                        "Domain {} receipt poll error for {:?}: {}",
                        self.domain_id, tx_hash, err
                    );
                    backoff = grow_backoff(backoff, max_backoff);
                }
            }

            crate::metrics::record_receipt_poll(self.domain_id);

            if Instant::now() + backoff >= deadline {
                return Err(BridgeError::Timeout {
                    operation: format!(
                        "receipt for {:?} on domain {}",
                        tx_hash, self.domain_id
                    ),
                });
            }
            tokio::time::sleep(with_jitter(backoff)).await;
        }
    }

    fn connection_error(&self, e: impl std::fmt::Display) -> BridgeError {
        BridgeError::ChainConnection {
            domain_id: self.domain_id,
            message: e.to_string(),
        }
    }
}

fn parse_address(value: &str, domain_id: u32) -> BridgeResult<Address> {
    value.parse().map_err(|e| {
        BridgeError::Config(format!(
            "Invalid contract address {:?} for domain {}: {}",
            value, domain_id, e
        ))
    })
}

/// Double the delay up to the configured ceiling
fn grow_backoff(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current * 2, max)
}

/// Spread poll times by +/-15% so concurrent transfers do not hammer an
/// endpoint in lockstep
fn with_jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.85..1.15);
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth_is_capped() {
        let max = Duration::from_millis(30_000);
        let mut backoff = Duration::from_millis(4_000);

        backoff = grow_backoff(backoff, max);
        assert_eq!(backoff, Duration::from_millis(8_000));

        for _ in 0..10 {
            backoff = grow_backoff(backoff, max);
        }
        assert_eq!(backoff, max);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let base = Duration::from_millis(4_000);
        for _ in 0..100 {
            let jittered = with_jitter(base);
            assert!(jittered >= Duration::from_millis(3_399));
            assert!(jittered <= Duration::from_millis(4_601));
        }
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("not-an-address", 0).is_err());
        assert!(parse_address("0x07865c6e87b9f70255377e024ace6630c1eaa37f", 0).is_ok());
    }
}
