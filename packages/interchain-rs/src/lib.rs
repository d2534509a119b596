//! Interchain-RS: Shared Library for the XRPL EVM Bridge
//!
//! This crate provides the cross-chain instruction protocol shared by the
//! withdraw relayer and the user CLI:
//!
//! - **Amounts** - XRP/drops parsing and drops → 18-decimal sidechain units
//! - **Memo Codec** - Hex encoding of the named memo fields read by the bridge
//! - **Instructions** - Outbound transfer/donation instructions and the XRPL
//!   `Payment` description handed to the ledger client
//! - **XRPL Addresses** - Classic address validation and derivation from a public key
//! - **Claims** - Signed, timestamped withdrawal claims and their authentication
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! interchain-rs = { path = "../interchain-rs" }
//! ```

pub mod amount;
pub mod auth;
pub mod claim;
pub mod hash;
pub mod instruction;
pub mod memo;
pub mod xrpl_address;

// Re-export commonly used items at the crate root
pub use amount::{drops_to_xrp, to_destination_units, xrp_to_drops, AmountError};
pub use auth::{authenticate, AuthError, AuthPolicy, AuthenticatedWithdrawal, SignerBinding};
pub use claim::{canonical_message, WithdrawalClaim};
pub use instruction::{Instruction, InstructionError, InstructionKind, Intent, Payment};
pub use memo::{AddressEncoding, Memo, MemoError, MemoWrapper};
pub use xrpl_address::XrplAddress;
