//! One-time token approval
//!
//! Before the destination contract can move the relayer's tokens it needs an
//! ERC20 allowance. The first caller of [`ApprovalGate::ensure_approved`]
//! starts the approval flow in a spawned task; every later caller, including
//! requests that arrive while the flow is running, awaits the same outcome.
//! The flow runs at most once per process. A failed approval stays failed
//! until restart.

use alloy::primitives::U256;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::evm_client::DestinationChain;

/// Allowances at or above this are treated as unlimited
pub fn allowance_threshold() -> U256 {
    U256::MAX / U256::from(2u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Unchecked,
    Checking,
    Approved,
    Failed,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Unchecked => "unchecked",
            ApprovalState::Checking => "checking",
            ApprovalState::Approved => "approved",
            ApprovalState::Failed => "failed",
        }
    }

    /// Numeric form for the metrics gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            ApprovalState::Unchecked => 0,
            ApprovalState::Checking => 1,
            ApprovalState::Approved => 2,
            ApprovalState::Failed => -1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApprovalError {
    #[error("Failed to query allowance: {0}")]
    AllowanceQuery(String),

    #[error("Approve transaction failed: {0}")]
    ApproveFailed(String),

    #[error("Allowance is {allowance} after approval, below required threshold")]
    ApprovalVerificationFailed { allowance: String },

    #[error("Approval timed out after {0:?}")]
    Timeout(Duration),
}

type ApprovalFlow = Shared<BoxFuture<'static, Result<(), ApprovalError>>>;

/// Process-wide approval state for the relayer signer
pub struct ApprovalGate {
    chain: Arc<dyn DestinationChain>,
    call_timeout: Duration,
    flow: OnceLock<ApprovalFlow>,
    state: Arc<watch::Sender<ApprovalState>>,
}

impl ApprovalGate {
    pub fn new(chain: Arc<dyn DestinationChain>, call_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ApprovalState::Unchecked);
        Self {
            chain,
            call_timeout,
            flow: OnceLock::new(),
            state: Arc::new(state),
        }
    }

    /// Current state, without starting the flow
    pub fn state(&self) -> ApprovalState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<ApprovalState> {
        self.state.subscribe()
    }

    /// Wait until the relayer's allowance is in place, starting the flow if
    /// nobody has yet. Dropping the returned future does not cancel the flow.
    pub async fn ensure_approved(&self) -> Result<(), ApprovalError> {
        let flow = self.flow.get_or_init(|| {
            let task = tokio::spawn(run_approval(
                self.chain.clone(),
                self.state.clone(),
                self.call_timeout,
            ));

            async move {
                task.await.unwrap_or_else(|e| {
                    Err(ApprovalError::ApproveFailed(format!(
                        "approval task aborted: {}",
                        e
                    )))
                })
            }
            .boxed()
            .shared()
        });

        flow.clone().await
    }
}

async fn run_approval(
    chain: Arc<dyn DestinationChain>,
    state: Arc<watch::Sender<ApprovalState>>,
    call_timeout: Duration,
) -> Result<(), ApprovalError> {
    state.send_replace(ApprovalState::Checking);

    let result = approve_if_needed(chain.as_ref(), call_timeout).await;

    match &result {
        Ok(()) => {
            state.send_replace(ApprovalState::Approved);
            info!(relayer = %chain.relayer_address(), "Token allowance in place");
        }
        Err(e) => {
            state.send_replace(ApprovalState::Failed);
            error!(error = %e, "Token approval failed, withdrawals are disabled");
        }
    }

    result
}

async fn approve_if_needed(
    chain: &dyn DestinationChain,
    call_timeout: Duration,
) -> Result<(), ApprovalError> {
    let threshold = allowance_threshold();

    let allowance = query_allowance(chain, call_timeout).await?;
    if allowance >= threshold {
        info!("Allowance already sufficient, no approval needed");
        return Ok(());
    }

    warn!(allowance = %allowance, "Allowance below threshold, approving destination contract");

    let receipt = tokio::time::timeout(call_timeout, chain.approve(U256::MAX))
        .await
        .map_err(|_| ApprovalError::Timeout(call_timeout))?
        .map_err(|e| ApprovalError::ApproveFailed(e.to_string()))?;

    if !receipt.success {
        return Err(ApprovalError::ApproveFailed(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )));
    }

    info!(tx_hash = %receipt.transaction_hash, "Approve transaction confirmed");

    let allowance = query_allowance(chain, call_timeout).await?;
    if allowance < threshold {
        return Err(ApprovalError::ApprovalVerificationFailed {
            allowance: allowance.to_string(),
        });
    }

    Ok(())
}

async fn query_allowance(
    chain: &dyn DestinationChain,
    call_timeout: Duration,
) -> Result<U256, ApprovalError> {
    tokio::time::timeout(call_timeout, chain.allowance())
        .await
        .map_err(|_| ApprovalError::Timeout(call_timeout))?
        .map_err(|e| ApprovalError::AllowanceQuery(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm_client::ChainReceipt;
    use alloy::primitives::{Address, Bytes};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Token whose allowance only changes through `approve`
    struct FakeToken {
        allowance: Mutex<U256>,
        approve_sets: Option<U256>,
        approve_delay: Duration,
        fail_query: bool,
        approvals: AtomicUsize,
    }

    impl FakeToken {
        fn new(allowance: U256) -> Self {
            Self {
                allowance: Mutex::new(allowance),
                approve_sets: Some(U256::MAX),
                approve_delay: Duration::from_millis(0),
                fail_query: false,
                approvals: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DestinationChain for FakeToken {
        fn relayer_address(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        async fn allowance(&self) -> eyre::Result<U256> {
            if self.fail_query {
                return Err(eyre::eyre!("rpc unavailable"));
            }
            Ok(*self.allowance.lock().unwrap())
        }

        async fn approve(&self, _amount: U256) -> eyre::Result<ChainReceipt> {
            self.approvals.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.approve_delay).await;
            if let Some(v) = self.approve_sets {
                *self.allowance.lock().unwrap() = v;
            }
            Ok(ChainReceipt {
                transaction_hash: "0xapprove".to_string(),
                block_number: Some(1),
                gas_used: "46000".to_string(),
                success: true,
            })
        }

        async fn withdraw(
            &self,
            _source_address: Bytes,
            _amount: U256,
            _value: U256,
        ) -> eyre::Result<ChainReceipt> {
            unreachable!("approval never withdraws")
        }
    }

    fn gate(token: Arc<FakeToken>) -> ApprovalGate {
        ApprovalGate::new(token, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approve() {
        let token = Arc::new(FakeToken::new(U256::MAX));
        let gate = gate(token.clone());
        assert_eq!(gate.state(), ApprovalState::Unchecked);

        gate.ensure_approved().await.unwrap();
        assert_eq!(gate.state(), ApprovalState::Approved);
        assert_eq!(token.approvals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let token = Arc::new(FakeToken::new(allowance_threshold()));
        let gate = gate(token.clone());
        gate.ensure_approved().await.unwrap();
        assert_eq!(token.approvals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_low_allowance_approves_once() {
        let token = Arc::new(FakeToken::new(U256::ZERO));
        let gate = gate(token.clone());

        gate.ensure_approved().await.unwrap();
        gate.ensure_approved().await.unwrap();
        assert_eq!(token.approvals.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), ApprovalState::Approved);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_approval() {
        let mut token = FakeToken::new(U256::ZERO);
        token.approve_delay = Duration::from_millis(100);
        let token = Arc::new(token);
        let gate = Arc::new(gate(token.clone()));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.ensure_approved().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(()));
        }
        assert_eq!(token.approvals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verification_failure_is_sticky() {
        let mut token = FakeToken::new(U256::from(5u8));
        token.approve_sets = None;
        let token = Arc::new(token);
        let gate = gate(token.clone());

        let err = gate.ensure_approved().await.unwrap_err();
        assert_eq!(
            err,
            ApprovalError::ApprovalVerificationFailed {
                allowance: "5".to_string()
            }
        );
        assert_eq!(gate.state(), ApprovalState::Failed);

        // Not retried
        assert_eq!(gate.ensure_approved().await.unwrap_err(), err);
        assert_eq!(token.approvals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_allowance_query_failure() {
        let mut token = FakeToken::new(U256::ZERO);
        token.fail_query = true;
        let gate = gate(Arc::new(token));

        match gate.ensure_approved().await {
            Err(ApprovalError::AllowanceQuery(msg)) => assert!(msg.contains("rpc unavailable")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_approve_timeout() {
        let mut token = FakeToken::new(U256::ZERO);
        token.approve_delay = Duration::from_secs(10);
        let gate = ApprovalGate::new(Arc::new(token), Duration::from_millis(50));

        assert_eq!(
            gate.ensure_approved().await,
            Err(ApprovalError::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(
            ApprovalError::Timeout(Duration::from_millis(50)).to_string(),
            "Approval timed out after 50ms"
        );
        assert_eq!(gate.state(), ApprovalState::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_cancel_flow() {
        let mut token = FakeToken::new(U256::ZERO);
        token.approve_delay = Duration::from_millis(100);
        let token = Arc::new(token);
        let gate = gate(token.clone());

        let early = tokio::time::timeout(Duration::from_millis(10), gate.ensure_approved()).await;
        assert!(early.is_err(), "first caller gave up before approval finished");

        let mut states = gate.subscribe();
        states
            .wait_for(|s| *s == ApprovalState::Approved)
            .await
            .unwrap();
        gate.ensure_approved().await.unwrap();
        assert_eq!(token.approvals.load(Ordering::SeqCst), 1);
    }
}
