//! Withdraw relayer configuration
//!
//! Loaded once at startup from the environment (and `.env` if present).
//! Any missing required value aborts startup.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use interchain_rs::SignerBinding;
use std::env;
use std::fmt;
use std::str::FromStr;

/// 1 XRP in sidechain wei, paid with each withdraw for the return-trip bridge fee
const DEFAULT_GAS_FEE_WEI: u128 = 1_000_000_000_000_000_000;

/// Withdraw relayer configuration
#[derive(Clone)]
pub struct Config {
    /// EVM sidechain RPC URL
    pub rpc_url: String,
    /// Relayer signing key (hex)
    pub private_key: String,
    /// Destination contract exposing `withdraw(bytes,uint256)`
    pub contract_address: Address,
    /// Token the destination contract spends on the relayer's behalf
    pub token_address: Address,

    /// HTTP bind address (default 0.0.0.0)
    pub bind_address: String,
    /// HTTP port (default 3000)
    pub port: u16,

    /// Native value attached to each withdraw call
    pub gas_fee_wei: U256,
    /// Upper bound on a single contract call including confirmation
    pub chain_call_timeout_secs: u64,
    /// Which account a valid claim signature authorizes
    pub signer_binding: SignerBinding,
    /// Maximum remembered claims for replay protection
    pub replay_cache_size: usize,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("contract_address", &self.contract_address)
            .field("token_address", &self.token_address)
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("gas_fee_wei", &self.gas_fee_wei)
            .field("chain_call_timeout_secs", &self.chain_call_timeout_secs)
            .field("signer_binding", &self.signer_binding)
            .field("replay_cache_size", &self.replay_cache_size)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        Self::from_env()
    }

    /// Read configuration from process environment variables only
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rpc_url: required("WITHDRAW_RELAYER_RPC_URL")?,
            private_key: required("WITHDRAW_RELAYER_PRIVATE_KEY")?,
            contract_address: Address::from_str(&required(
                "WITHDRAW_RELAYER_DESTINATION_CONTRACT_ADDRESS",
            )?)
            .wrap_err("Invalid WITHDRAW_RELAYER_DESTINATION_CONTRACT_ADDRESS")?,
            token_address: Address::from_str(&required("WITHDRAW_RELAYER_TOKEN_ADDRESS")?)
                .wrap_err("Invalid WITHDRAW_RELAYER_TOKEN_ADDRESS")?,

            bind_address: env::var("WITHDRAW_RELAYER_BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: optional("WITHDRAW_RELAYER_PORT")?.unwrap_or(3000),

            gas_fee_wei: match env::var("WITHDRAW_RELAYER_GAS_FEE_WEI") {
                Ok(v) => U256::from_str_radix(v.trim(), 10)
                    .map_err(|_| eyre!("Invalid WITHDRAW_RELAYER_GAS_FEE_WEI: {}", v))?,
                Err(_) => U256::from(DEFAULT_GAS_FEE_WEI),
            },
            chain_call_timeout_secs: optional("WITHDRAW_RELAYER_CHAIN_CALL_TIMEOUT_SECS")?
                .unwrap_or(120),
            signer_binding: match env::var("WITHDRAW_RELAYER_SIGNER_BINDING") {
                Ok(v) => v
                    .parse()
                    .map_err(|e| eyre!("Invalid WITHDRAW_RELAYER_SIGNER_BINDING: {}", e))?,
                Err(_) => SignerBinding::ClaimedAccount,
            },
            replay_cache_size: optional("WITHDRAW_RELAYER_REPLAY_CACHE_SIZE")?.unwrap_or(100_000),
        })
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(eyre!("{} environment variable is required", name)),
    }
}

fn optional<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| eyre!("Invalid {}: {}", name, v)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const REQUIRED: [(&str, &str); 4] = [
        ("WITHDRAW_RELAYER_RPC_URL", "http://localhost:8545"),
        (
            "WITHDRAW_RELAYER_PRIVATE_KEY",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ),
        (
            "WITHDRAW_RELAYER_DESTINATION_CONTRACT_ADDRESS",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        ),
        (
            "WITHDRAW_RELAYER_TOKEN_ADDRESS",
            "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
        ),
    ];

    const OPTIONAL: [&str; 6] = [
        "WITHDRAW_RELAYER_BIND_ADDRESS",
        "WITHDRAW_RELAYER_PORT",
        "WITHDRAW_RELAYER_GAS_FEE_WEI",
        "WITHDRAW_RELAYER_CHAIN_CALL_TIMEOUT_SECS",
        "WITHDRAW_RELAYER_SIGNER_BINDING",
        "WITHDRAW_RELAYER_REPLAY_CACHE_SIZE",
    ];

    fn reset_env() {
        for (k, v) in REQUIRED {
            env::set_var(k, v);
        }
        for k in OPTIONAL {
            env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        reset_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.gas_fee_wei, U256::from(DEFAULT_GAS_FEE_WEI));
        assert_eq!(config.chain_call_timeout_secs, 120);
        assert_eq!(config.signer_binding, SignerBinding::ClaimedAccount);
        assert_eq!(config.replay_cache_size, 100_000);
    }

    #[test]
    #[serial]
    fn test_missing_required_value_is_fatal() {
        for (missing, _) in REQUIRED {
            reset_env();
            env::remove_var(missing);
            let err = Config::from_env().unwrap_err().to_string();
            assert!(err.contains(missing), "{} -> {}", missing, err);
        }
    }

    #[test]
    #[serial]
    fn test_overrides_and_invalid_values() {
        reset_env();
        env::set_var("WITHDRAW_RELAYER_PORT", "8080");
        env::set_var("WITHDRAW_RELAYER_SIGNER_BINDING", "derived");
        env::set_var("WITHDRAW_RELAYER_GAS_FEE_WEI", "500");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.signer_binding, SignerBinding::DerivedAddress);
        assert_eq!(config.gas_fee_wei, U256::from(500u64));

        env::set_var("WITHDRAW_RELAYER_PORT", "not-a-port");
        assert!(Config::from_env().is_err());

        reset_env();
        env::set_var("WITHDRAW_RELAYER_TOKEN_ADDRESS", "0x1234");
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_debug_redacts_private_key() {
        reset_env();
        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("ac0974bec39a17e3"));
    }
}
