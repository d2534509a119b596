//! Withdrawal relay
//!
//! Turns an authenticated claim into a `withdraw` call on the destination
//! contract. Steps run in a fixed order and stop at the first failure:
//! parse, approval gate, authentication, replay check, amount conversion,
//! contract call, receipt.

use alloy::primitives::{Bytes, U256};
use interchain_rs::{authenticate, to_destination_units, AuthError, AuthPolicy, WithdrawalClaim};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalError, ApprovalGate};
use crate::config::Config;
use crate::evm_client::DestinationChain;
use crate::replay::ReplayGuard;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Signer {signer} is not authorized for account {account}")]
    SignerMismatch { signer: String, account: String },

    #[error("Claim expired: timestamp {timestamp} is {age_ms}ms from server time")]
    ExpiredClaim { timestamp: u64, age_ms: i128 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Claim has already been submitted")]
    ReplayedClaim,

    #[error("Token approval failed: {0}")]
    ApprovalFailed(#[from] ApprovalError),

    #[error("Withdraw call failed: {0}")]
    ChainCallFailed(String),
}

impl From<AuthError> for RelayError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidRequest(msg) => RelayError::InvalidRequest(msg),
            AuthError::InvalidSignature => RelayError::InvalidSignature,
            AuthError::SignerMismatch { signer, account } => {
                RelayError::SignerMismatch { signer, account }
            }
            AuthError::ExpiredClaim { timestamp, age_ms } => {
                RelayError::ExpiredClaim { timestamp, age_ms }
            }
        }
    }
}

impl RelayError {
    /// Short stable label, used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::InvalidSignature => "invalid_signature",
            RelayError::SignerMismatch { .. } => "signer_mismatch",
            RelayError::ExpiredClaim { .. } => "expired_claim",
            RelayError::InvalidAmount(_) => "invalid_amount",
            RelayError::ReplayedClaim => "replayed_claim",
            RelayError::ApprovalFailed(_) => "approval_failed",
            RelayError::ChainCallFailed(_) => "chain_call_failed",
        }
    }
}

/// Successful withdrawal, serialized as the HTTP response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawReceipt {
    pub success: bool,
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: String,
}

/// Tunables for [`WithdrawRelay`]
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub policy: AuthPolicy,
    /// Native value sent with each withdraw call
    pub gas_fee: U256,
    pub call_timeout: Duration,
    pub replay_cache_size: usize,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: AuthPolicy {
                binding: config.signer_binding,
                ..AuthPolicy::default()
            },
            gas_fee: config.gas_fee_wei,
            call_timeout: Duration::from_secs(config.chain_call_timeout_secs),
            replay_cache_size: config.replay_cache_size,
        }
    }
}

pub struct WithdrawRelay {
    chain: Arc<dyn DestinationChain>,
    gate: Arc<ApprovalGate>,
    replay: ReplayGuard,
    settings: RelaySettings,
}

impl WithdrawRelay {
    pub fn new(
        chain: Arc<dyn DestinationChain>,
        gate: Arc<ApprovalGate>,
        settings: RelaySettings,
    ) -> Self {
        let replay_ttl = Duration::from_millis(
            settings.policy.freshness_window_ms + settings.policy.max_clock_skew_ms,
        );
        Self {
            chain,
            gate,
            replay: ReplayGuard::new(settings.replay_cache_size, replay_ttl),
            settings,
        }
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    /// Handle a raw `POST /withdraw` body at the current time
    pub async fn handle_withdraw(&self, raw: &[u8]) -> Result<WithdrawReceipt, RelayError> {
        self.handle_withdraw_at(raw, now_ms()).await
    }

    /// Handle a raw `POST /withdraw` body as if received at `now_ms`
    pub async fn handle_withdraw_at(
        &self,
        raw: &[u8],
        now_ms: u64,
    ) -> Result<WithdrawReceipt, RelayError> {
        let claim: WithdrawalClaim = serde_json::from_slice(raw)
            .map_err(|e| RelayError::InvalidRequest(e.to_string()))?;

        self.gate.ensure_approved().await?;

        let withdrawal = authenticate(&claim, now_ms, &self.settings.policy)?;

        if !self.replay.check_and_record(claim.replay_key()).await {
            warn!(account = %claim.account, timestamp = claim.timestamp, "Rejected replayed claim");
            return Err(RelayError::ReplayedClaim);
        }

        let amount = to_destination_units(&withdrawal.drops.to_string())
            .map_err(|e| RelayError::InvalidAmount(e.to_string()))?;

        debug!(
            account = %withdrawal.account,
            requested = %withdrawal.requested_amount,
            amount = %amount,
            "Submitting withdraw"
        );

        let source_address = Bytes::copy_from_slice(withdrawal.account.as_bytes());
        let call = self
            .chain
            .withdraw(source_address, amount, self.settings.gas_fee);

        let receipt = tokio::time::timeout(self.settings.call_timeout, call)
            .await
            .map_err(|_| {
                RelayError::ChainCallFailed(format!(
                    "timed out after {:?}",
                    self.settings.call_timeout
                ))
            })?
            .map_err(|e| RelayError::ChainCallFailed(e.to_string()))?;

        if !receipt.success {
            return Err(RelayError::ChainCallFailed(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        info!(
            account = %withdrawal.account,
            amount = %amount,
            tx_hash = %receipt.transaction_hash,
            "Withdrawal relayed"
        );

        Ok(WithdrawReceipt {
            success: true,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
