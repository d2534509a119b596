//! Withdrawal claims
//!
//! A claim is the JSON body a user sends to the withdraw relayer:
//!
//! ```json
//! {
//!   "account": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
//!   "requestedAmount": "10",
//!   "timestamp": 1700000000000,
//!   "signature": "3045...",
//!   "signerPublicKey": "0330..."
//! }
//! ```
//!
//! The signature covers the compact JSON of the first three fields in exactly
//! this order, `{"account":…,"requestedAmount":…,"timestamp":…}`, hashed with
//! SHA-512Half and signed with secp256k1 ECDSA (DER encoded), the same way
//! XRPL signs transactions.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use serde::{Deserialize, Serialize};

use crate::hash::sha512_half;

/// A signed, timestamped withdrawal request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WithdrawalClaim {
    /// XRPL classic address receiving the withdrawal
    pub account: String,
    /// Amount in XRP display units (e.g. "10", "0.5")
    pub requested_amount: String,
    /// Unix time in milliseconds when the claim was signed
    pub timestamp: u64,
    /// Hex DER secp256k1 signature over the canonical message
    pub signature: String,
    /// Hex 33-byte compressed secp256k1 public key
    pub signer_public_key: String,
}

/// Signed subset of the claim. Field order is part of the protocol.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedFields<'a> {
    account: &'a str,
    requested_amount: &'a str,
    timestamp: u64,
}

/// Exact bytes a claim producer signs
pub fn canonical_message(account: &str, requested_amount: &str, timestamp: u64) -> Vec<u8> {
    serde_json::to_vec(&SignedFields {
        account,
        requested_amount,
        timestamp,
    })
    .expect("string and integer fields always serialize")
}

impl WithdrawalClaim {
    /// Build and sign a claim with the given key
    pub fn sign(
        key: &SigningKey,
        account: &str,
        requested_amount: &str,
        timestamp: u64,
    ) -> Result<Self, k256::ecdsa::Error> {
        let digest = sha512_half(&canonical_message(account, requested_amount, timestamp));
        let signature: Signature = key.sign_prehash(&digest)?;

        Ok(Self {
            account: account.to_string(),
            requested_amount: requested_amount.to_string(),
            timestamp,
            signature: hex::encode_upper(signature.to_der().as_bytes()),
            signer_public_key: hex::encode_upper(
                key.verifying_key().to_encoded_point(true).as_bytes(),
            ),
        })
    }

    /// Canonical message reconstructed from this claim's fields
    pub fn message(&self) -> Vec<u8> {
        canonical_message(&self.account, &self.requested_amount, self.timestamp)
    }

    /// Digest the signature must cover
    pub fn digest(&self) -> [u8; 32] {
        sha512_half(&self.message())
    }

    /// Key used to deduplicate claims: keccak256(digest ‖ signer public key).
    ///
    /// Independent of the signature encoding, so any other valid signature
    /// over the same message by the same key maps to the same key.
    pub fn replay_key(&self) -> [u8; 32] {
        let signer = self.signer_public_key.to_ascii_lowercase();
        let mut data = Vec::with_capacity(32 + signer.len());
        data.extend_from_slice(&self.digest());
        data.extend_from_slice(signer.as_bytes());
        crate::hash::keccak256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).unwrap()
    }

    #[test]
    fn test_canonical_message_layout() {
        let msg = canonical_message("rAlice", "10", 1_700_000_000_000);
        assert_eq!(
            String::from_utf8(msg).unwrap(),
            r#"{"account":"rAlice","requestedAmount":"10","timestamp":1700000000000}"#
        );
    }

    #[test]
    fn test_canonical_message_escapes_strings() {
        let msg = canonical_message("r\"x", "1", 0);
        assert_eq!(
            String::from_utf8(msg).unwrap(),
            r#"{"account":"r\"x","requestedAmount":"1","timestamp":0}"#
        );
    }

    #[test]
    fn test_sign_fills_key_and_signature() {
        let key = test_key();
        let claim = WithdrawalClaim::sign(&key, "rAlice", "10", 1).unwrap();
        assert_eq!(claim.account, "rAlice");
        assert_eq!(claim.requested_amount, "10");
        assert_eq!(claim.timestamp, 1);
        assert_eq!(claim.signer_public_key.len(), 66);
        assert!(claim.signature.starts_with("30"), "DER sequence tag");
    }

    #[test]
    fn test_claim_json_field_names() {
        let claim = WithdrawalClaim::sign(&test_key(), "rAlice", "10", 5).unwrap();
        let json = serde_json::to_value(&claim).unwrap();
        for field in [
            "account",
            "requestedAmount",
            "timestamp",
            "signature",
            "signerPublicKey",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }

    #[test]
    fn test_claim_rejects_unknown_fields() {
        let body = r#"{"account":"r","requestedAmount":"1","timestamp":1,
            "signature":"00","signerPublicKey":"00","sourceAddress":"r"}"#;
        assert!(serde_json::from_str::<WithdrawalClaim>(body).is_err());
    }

    #[test]
    fn test_replay_key_distinguishes_claims() {
        let key = test_key();
        let a = WithdrawalClaim::sign(&key, "rAlice", "10", 1).unwrap();
        let b = WithdrawalClaim::sign(&key, "rAlice", "10", 2).unwrap();
        assert_eq!(a.replay_key(), a.clone().replay_key());
        assert_ne!(a.replay_key(), b.replay_key());
    }

    #[test]
    fn test_replay_key_ignores_signature_encoding() {
        let key = test_key();
        let claim = WithdrawalClaim::sign(&key, "rAlice", "10", 1).unwrap();

        let sig = Signature::from_der(&hex::decode(&claim.signature).unwrap()).unwrap();
        let (r, s) = sig.split_scalars();
        let high_s = Signature::from_scalars(r, -s).unwrap();

        let mut twin = claim.clone();
        twin.signature = hex::encode(high_s.to_der().as_bytes());
        twin.signer_public_key = claim.signer_public_key.to_ascii_lowercase();
        assert_ne!(twin.signature, claim.signature);
        assert_eq!(twin.replay_key(), claim.replay_key());

        let other_signer =
            WithdrawalClaim::sign(&SigningKey::from_slice(&[0x43u8; 32]).unwrap(), "rAlice", "10", 1)
                .unwrap();
        assert_ne!(other_signer.replay_key(), claim.replay_key());
    }
}
