//! XRPL Withdraw Relayer - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod approval;
pub mod config;
pub mod evm_client;
pub mod relay;
pub mod replay;
pub mod server;
