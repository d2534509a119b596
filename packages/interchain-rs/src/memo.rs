//! Memo Codec
//!
//! The bridge reads instructions from XRPL memos. Each memo carries a field
//! name (`MemoType`) and a value (`MemoData`), both hex-encoded:
//!
//! ```text
//! { "Memo": { "MemoType": hex("destination_chain"), "MemoData": hex("xrpl-evm") } }
//! ```
//!
//! Field names and plain string values are the hex of their UTF-8 bytes.
//! Destination addresses are already hex, so they are either hex-encoded a
//! second time ([`AddressEncoding::HexOfHex`]) or passed through as raw hex
//! ([`AddressEncoding::Raw`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_TYPE: &str = "type";
pub const FIELD_DESTINATION_ADDRESS: &str = "destination_address";
pub const FIELD_DESTINATION_CHAIN: &str = "destination_chain";
pub const FIELD_GAS_FEE_AMOUNT: &str = "gas_fee_amount";
pub const FIELD_PAYLOAD: &str = "payload";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoError {
    #[error("Invalid hex input: {0}")]
    InvalidHexInput(String),

    #[error("Memo field is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Missing memo field: {0}")]
    MissingField(&'static str),

    #[error("Duplicate memo field: {0}")]
    DuplicateField(String),
}

/// How the destination address is placed into `MemoData`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressEncoding {
    /// hex(ascii hex address), e.g. "86ab" → "38366162"
    #[default]
    HexOfHex,
    /// The address hex itself, e.g. "86ab" → "86ab"
    Raw,
}

/// One named memo field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(rename = "MemoType")]
    pub memo_type: String,
    #[serde(rename = "MemoData")]
    pub memo_data: String,
}

/// XRPL wire wrapper: `{"Memo": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoWrapper {
    #[serde(rename = "Memo")]
    pub memo: Memo,
}

impl Memo {
    /// Memo whose name and value are both plain strings
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            memo_type: encode_field(name),
            memo_data: encode_field(value),
        }
    }

    /// Memo whose value is already hex
    pub fn with_hex_data(name: &str, data_hex: String) -> Self {
        Self {
            memo_type: encode_field(name),
            memo_data: data_hex,
        }
    }

    /// Decoded field name
    pub fn name(&self) -> Result<String, MemoError> {
        decode_field(&self.memo_type)
    }

    pub fn wrap(self) -> MemoWrapper {
        MemoWrapper { memo: self }
    }
}

/// Hex-encode the UTF-8 bytes of a field name or plain value
pub fn encode_field(value: &str) -> String {
    hex::encode(value.as_bytes())
}

/// Decode a hex field back into a string (case-insensitive hex)
pub fn decode_field(hex_str: &str) -> Result<String, MemoError> {
    let bytes = hex::decode(hex_str).map_err(|_| MemoError::InvalidHexInput(hex_str.to_string()))?;
    String::from_utf8(bytes).map_err(|_| MemoError::InvalidUtf8(hex_str.to_string()))
}

/// Strip an optional `0x` prefix and require the remainder to be pure hex
pub fn without_hex_prefix(value: &str) -> Result<&str, MemoError> {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if is_hex_string(stripped) {
        Ok(stripped)
    } else {
        Err(MemoError::InvalidHexInput(value.to_string()))
    }
}

/// True for a non-empty string of ASCII hex digits
pub fn is_hex_string(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Encode an already-hex address for `MemoData`
pub fn encode_address(address: &str, encoding: AddressEncoding) -> Result<String, MemoError> {
    let stripped = without_hex_prefix(address)?;
    Ok(match encoding {
        AddressEncoding::HexOfHex => encode_field(stripped),
        AddressEncoding::Raw => stripped.to_string(),
    })
}

/// Recover the unprefixed address hex from `MemoData`
pub fn decode_address(data: &str, encoding: AddressEncoding) -> Result<String, MemoError> {
    let address = match encoding {
        AddressEncoding::HexOfHex => decode_field(data)?,
        AddressEncoding::Raw => data.to_string(),
    };
    without_hex_prefix(&address).map(str::to_string)
}
