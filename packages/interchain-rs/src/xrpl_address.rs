//! XRPL classic address encoding
//!
//! A classic address is the Base58Check encoding (ripple alphabet, version
//! byte `0x00`) of a 20-byte account ID. For secp256k1 keys the account ID is
//! `RIPEMD160(SHA256(compressed_pubkey))`, the same derivation Cosmos chains
//! use, so we reuse tendermint's account ID type for it.
//!
//! ```text
//! rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh  <->  b5f762798a53d543a014caf8b297cff8f2f937e8
//! ```

use k256::ecdsa::VerifyingKey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version byte of classic account addresses
const ACCOUNT_ID_VERSION: u8 = 0x00;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AddressError {
    #[error("Invalid XRPL address: {0}")]
    InvalidAddress(String),
}

/// A validated XRPL account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XrplAddress([u8; 20]);

impl XrplAddress {
    pub fn from_account_id(account_id: [u8; 20]) -> Self {
        Self(account_id)
    }

    /// Derive the account controlled by a secp256k1 public key
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let id = tendermint::account::Id::from(*key);
        let mut account_id = [0u8; 20];
        account_id.copy_from_slice(id.as_bytes());
        Self(account_id)
    }

    /// Parse and checksum-verify a classic address ("r...")
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidAddress(address.to_string());

        if !address.starts_with('r') {
            return Err(invalid());
        }

        // Output keeps the version byte and drops the 4-byte checksum
        let decoded = bs58::decode(address)
            .with_alphabet(bs58::Alphabet::RIPPLE)
            .with_check(Some(ACCOUNT_ID_VERSION))
            .into_vec()
            .map_err(|_| invalid())?;

        if decoded.len() != 21 || decoded[0] != ACCOUNT_ID_VERSION {
            return Err(invalid());
        }

        let mut account_id = [0u8; 20];
        account_id.copy_from_slice(&decoded[1..]);
        Ok(Self(account_id))
    }

    pub fn account_id(&self) -> &[u8; 20] {
        &self.0
    }

    /// Encode as a classic address
    pub fn to_classic(&self) -> String {
        bs58::encode(self.0)
            .with_alphabet(bs58::Alphabet::RIPPLE)
            .with_check_version(ACCOUNT_ID_VERSION)
            .into_string()
    }
}

impl FromStr for XrplAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for XrplAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_classic())
    }
}

/// True if `address` is a well-formed classic address
pub fn is_valid_classic_address(address: &str) -> bool {
    XrplAddress::parse(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_ADDRESS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const GENESIS_ACCOUNT_ID: &str = "b5f762798a53d543a014caf8b297cff8f2f937e8";
    const GENESIS_PUBLIC_KEY: &str =
        "0330E7FC9D56BB25D6893BA3F317AE5BCF33B3291BD63DB32654A313222F7FD020";

    #[test]
    fn test_parse_genesis_address() {
        let addr = XrplAddress::parse(GENESIS_ADDRESS).unwrap();
        assert_eq!(hex::encode(addr.account_id()), GENESIS_ACCOUNT_ID);
        assert_eq!(addr.to_classic(), GENESIS_ADDRESS);
        assert_eq!(addr.to_string(), GENESIS_ADDRESS);
    }

    #[test]
    fn test_account_zero() {
        let addr = XrplAddress::from_account_id([0u8; 20]);
        assert_eq!(addr.to_classic(), "rrrrrrrrrrrrrrrrrrrrrhoLvTp");
        assert_eq!(
            XrplAddress::parse("rrrrrrrrrrrrrrrrrrrrrhoLvTp").unwrap(),
            addr
        );
    }

    #[test]
    fn test_from_public_key_genesis() {
        let key_bytes = hex::decode(GENESIS_PUBLIC_KEY).unwrap();
        let key = VerifyingKey::from_sec1_bytes(&key_bytes).unwrap();
        assert_eq!(
            XrplAddress::from_public_key(&key).to_classic(),
            GENESIS_ADDRESS
        );
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        // Last character altered
        assert!(XrplAddress::parse("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTj").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "r",
            "0x86283a5fEF518F0C18c99eCAB3D74697c886C099",
            "xHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
            "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh ",
            "rHb9CJAWyB4rj91VRWn96DkukG4bwdty0h",
        ] {
            assert!(!is_valid_classic_address(bad), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_from_str() {
        let addr: XrplAddress = GENESIS_ADDRESS.parse().unwrap();
        assert_eq!(addr.to_classic(), GENESIS_ADDRESS);
    }
}
