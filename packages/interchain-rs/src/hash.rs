//! Hash functions shared by the memo payload and claim signatures
//!
//! - keccak256 matches Solidity's `keccak256`, used for intent selectors.
//! - SHA-512Half is the XRP Ledger's signing digest.

use sha2::{Digest, Sha512};
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// First 32 bytes of SHA-512 over `data`
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest[..32]);
    output
}

/// Convert bytes32 to hex string (lowercase, no prefix)
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}
