//! Withdrawal claim authentication
//!
//! Gates run in a fixed order and the first failure wins:
//!
//! 1. Format: account is a classic address, amount is a positive XRP decimal,
//!    key and signature are well-formed hex
//! 2. Canonical message reconstruction (see [`crate::claim::canonical_message`])
//! 3. Signature verification against `signerPublicKey`
//! 4. Identity binding between the signer and the account
//! 5. Freshness (5 minute window, 30 second future skew)

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use std::str::FromStr;
use thiserror::Error;

use crate::amount::xrp_to_drops;
use crate::claim::WithdrawalClaim;
use crate::xrpl_address::XrplAddress;

/// Maximum claim age
pub const FRESHNESS_WINDOW_MS: u64 = 5 * 60 * 1000;

/// How far in the future a timestamp may be
pub const MAX_CLOCK_SKEW_MS: u64 = 30 * 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Signer {signer} does not own account {account}")]
    SignerMismatch { signer: String, account: String },

    #[error("Claim expired: timestamp {timestamp} is {age_ms}ms from now")]
    ExpiredClaim { timestamp: u64, age_ms: i128 },
}

/// Which account a valid signature authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerBinding {
    /// The signer's derived address must equal the claimed account
    #[default]
    ClaimedAccount,
    /// The withdrawal goes to the signer's derived address
    DerivedAddress,
}

impl FromStr for SignerBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" | "claimed_account" => Ok(Self::ClaimedAccount),
            "derived" | "derived_address" => Ok(Self::DerivedAddress),
            other => Err(format!("unknown signer binding: {}", other)),
        }
    }
}

/// Authentication parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    pub freshness_window_ms: u64,
    pub max_clock_skew_ms: u64,
    pub binding: SignerBinding,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            freshness_window_ms: FRESHNESS_WINDOW_MS,
            max_clock_skew_ms: MAX_CLOCK_SKEW_MS,
            binding: SignerBinding::default(),
        }
    }
}

/// Fields of a claim that passed every gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedWithdrawal {
    /// Classic address the withdrawal pays out to
    pub account: String,
    /// Amount as submitted, in XRP
    pub requested_amount: String,
    /// `requested_amount` in drops
    pub drops: u64,
}

/// Authenticate a claim at time `now_ms` (Unix milliseconds)
pub fn authenticate(
    claim: &WithdrawalClaim,
    now_ms: u64,
    policy: &AuthPolicy,
) -> Result<AuthenticatedWithdrawal, AuthError> {
    // 1. Format
    let account = XrplAddress::parse(&claim.account)
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
    let drops = xrp_to_drops(&claim.requested_amount)
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
    let signer_key = parse_public_key(&claim.signer_public_key)?;
    let signature = parse_signature(&claim.signature)?;

    // 2. Canonical message
    let digest = claim.digest();

    // 3. Signature (fully canonical: high-S is rejected, as on XRPL)
    if signature.normalize_s().is_some() {
        return Err(AuthError::InvalidSignature);
    }
    signer_key
        .verify_prehash(&digest, &signature)
        .map_err(|_| AuthError::InvalidSignature)?;

    // 4. Identity binding
    let signer = XrplAddress::from_public_key(&signer_key);
    let payout = match policy.binding {
        SignerBinding::ClaimedAccount if signer != account => {
            return Err(AuthError::SignerMismatch {
                signer: signer.to_classic(),
                account: claim.account.clone(),
            });
        }
        SignerBinding::ClaimedAccount => claim.account.clone(),
        SignerBinding::DerivedAddress => signer.to_classic(),
    };

    // 5. Freshness
    let age_ms = now_ms as i128 - claim.timestamp as i128;
    if age_ms > policy.freshness_window_ms as i128 || -age_ms > policy.max_clock_skew_ms as i128 {
        return Err(AuthError::ExpiredClaim {
            timestamp: claim.timestamp,
            age_ms,
        });
    }

    Ok(AuthenticatedWithdrawal {
        account: payout,
        requested_amount: claim.requested_amount.clone(),
        drops,
    })
}

fn parse_public_key(key_hex: &str) -> Result<VerifyingKey, AuthError> {
    let bytes = hex::decode(key_hex)
        .map_err(|_| AuthError::InvalidRequest("signerPublicKey is not hex".to_string()))?;
    if bytes.len() != 33 {
        return Err(AuthError::InvalidRequest(format!(
            "signerPublicKey must be a 33-byte compressed key, got {} bytes",
            bytes.len()
        )));
    }
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| {
        AuthError::InvalidRequest("signerPublicKey is not a secp256k1 point".to_string())
    })
}

fn parse_signature(signature_hex: &str) -> Result<Signature, AuthError> {
    let bytes = hex::decode(signature_hex)
        .map_err(|_| AuthError::InvalidRequest("signature is not hex".to_string()))?;
    Signature::from_der(&bytes).map_err(|_| AuthError::InvalidSignature)
}
