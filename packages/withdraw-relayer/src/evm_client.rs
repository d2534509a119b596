//! EVM sidechain client
//!
//! The relayer touches two contracts: the ERC20 token it has to approve for
//! spending, and the destination contract whose `withdraw` releases funds
//! back to XRPL. Both sit behind [`DestinationChain`] so the withdrawal flow
//! can be exercised without a node.
//!
//! Transactions are built with `with_recommended_fillers()`, which fetches the
//! nonce from the node. Sends are serialized until the node has accepted the
//! transaction, otherwise two concurrent withdrawals read the same nonce.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;

sol! {
    /// Sidechain contract that pays out withdrawals to XRPL accounts
    #[sol(rpc)]
    contract DestinationBridge {
        function withdraw(bytes sourceAddress, uint256 requestedAmount) external payable;
    }

    #[sol(rpc)]
    contract ERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// What the relayer keeps from a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: String,
    pub success: bool,
}

impl From<&TransactionReceipt> for ChainReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: format!("0x{:x}", receipt.transaction_hash),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used.to_string(),
            success: receipt.status(),
        }
    }
}

/// Operations the relayer needs from the sidechain
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Account that signs and pays for relayer transactions
    fn relayer_address(&self) -> Address;

    /// Token allowance from the relayer to the destination contract
    async fn allowance(&self) -> Result<U256>;

    /// Approve the destination contract to spend `amount` and wait for the receipt
    async fn approve(&self, amount: U256) -> Result<ChainReceipt>;

    /// Call `withdraw(sourceAddress, amount)` with `value` attached and wait for the receipt
    async fn withdraw(
        &self,
        source_address: Bytes,
        amount: U256,
        value: U256,
    ) -> Result<ChainReceipt>;
}

/// Alloy-backed [`DestinationChain`]
pub struct EvmDestination {
    rpc_url: Url,
    contract_address: Address,
    token_address: Address,
    signer: PrivateKeySigner,
    submission: Mutex<()>,
}

impl EvmDestination {
    pub fn new(config: &Config) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .wrap_err("Invalid WITHDRAW_RELAYER_PRIVATE_KEY")?;

        let rpc_url: Url = config.rpc_url.parse().wrap_err("Invalid RPC URL")?;

        info!(
            relayer_address = %signer.address(),
            contract = %config.contract_address,
            token = %config.token_address,
            "EVM client initialized"
        );

        Ok(Self {
            rpc_url,
            contract_address: config.contract_address,
            token_address: config.token_address,
            signer,
            submission: Mutex::new(()),
        })
    }
}

#[async_trait]
impl DestinationChain for EvmDestination {
    fn relayer_address(&self) -> Address {
        self.signer.address()
    }

    async fn allowance(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let token = ERC20::new(self.token_address, &provider);

        let allowance = token
            .allowance(self.signer.address(), self.contract_address)
            .call()
            .await
            .map_err(|e| eyre!("Failed to get allowance: {}", e))?;

        Ok(allowance._0)
    }

    async fn approve(&self, amount: U256) -> Result<ChainReceipt> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());
        let token = ERC20::new(self.token_address, &provider);

        let pending_tx = {
            let _guard = self.submission.lock().await;
            token
                .approve(self.contract_address, amount)
                .send()
                .await
                .map_err(|e| eyre!("Failed to send approve tx: {}", e))?
        };

        let tx_hash = *pending_tx.tx_hash();
        debug!(tx_hash = %tx_hash, "Approve transaction sent");

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| eyre!("Failed to get approve receipt: {}", e))?;

        Ok(ChainReceipt::from(&receipt))
    }

    async fn withdraw(
        &self,
        source_address: Bytes,
        amount: U256,
        value: U256,
    ) -> Result<ChainReceipt> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());
        let bridge = DestinationBridge::new(self.contract_address, &provider);

        let pending_tx = {
            let _guard = self.submission.lock().await;
            bridge
                .withdraw(source_address, amount)
                .value(value)
                .send()
                .await
                .map_err(|e| eyre!("Failed to send withdraw tx: {}", e))?
        };

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, amount = %amount, "Withdraw transaction sent");

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| eyre!("Failed to get withdraw receipt: {}", e))?;

        Ok(ChainReceipt::from(&receipt))
    }
}
