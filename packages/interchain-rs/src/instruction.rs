//! Outbound instructions (XRPL → EVM sidechain)
//!
//! An instruction is carried as memos on an XRPL `Payment` to the bridge's
//! multisig account. The bridge forwards it to `destination_address` on
//! `destination_chain`. Transfers carry a 32-byte `payload` telling the
//! destination contract what the transfer is for; donations carry none.
//!
//! Memos are always emitted in the canonical order:
//! `type`, `destination_address`, `destination_chain`, `gas_fee_amount`, `payload`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::hash::keccak256;
use crate::memo::{
    decode_address, decode_field, encode_address, without_hex_prefix, AddressEncoding, Memo, MemoError, MemoWrapper,
    FIELD_DESTINATION_ADDRESS, FIELD_DESTINATION_CHAIN, FIELD_GAS_FEE_AMOUNT, FIELD_PAYLOAD,
    FIELD_TYPE,
};
use crate::xrpl_address::XrplAddress;

/// The only message type the bridge accepts on XRPL
pub const MEMO_TYPE_INTERCHAIN_TRANSFER: &str = "interchain_transfer";

/// Chain name of the XRPL EVM sidechain on the bridge
pub const DEFAULT_DESTINATION_CHAIN: &str = "xrpl-evm";

/// Bridge gas fee attached to every instruction (1 XRP)
pub const DEFAULT_GAS_FEE_DROPS: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstructionError {
    #[error("Invalid destination address: {0}")]
    InvalidDestinationAddress(String),

    #[error("Destination chain must not be empty")]
    EmptyDestinationChain,

    #[error("Invalid XRPL address for {field}: {value}")]
    InvalidXrplAddress { field: &'static str, value: String },

    #[error("Payment amount must be positive")]
    ZeroAmount,

    #[error("Unsupported memo type: {0}")]
    UnsupportedType(String),

    #[error("Invalid gas fee amount: {0}")]
    InvalidGasFee(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Memo(#[from] MemoError),
}

/// What a transfer is for, agreed with the destination contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Deposit,
    Donate,
    Withdraw,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Deposit, Intent::Donate, Intent::Withdraw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Deposit => "deposit",
            Intent::Donate => "donate",
            Intent::Withdraw => "withdraw",
        }
    }

    /// `keccak256(literal)`; as a single `bytes32` its ABI encoding is itself
    pub fn selector(&self) -> [u8; 32] {
        keccak256(self.as_str().as_bytes())
    }

    pub fn from_selector(selector: &[u8; 32]) -> Option<Self> {
        Self::ALL.into_iter().find(|i| &i.selector() == selector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Transfer(Intent),
    Donate,
}

/// A bridge instruction ready to be encoded as memos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// 40 hex characters, no prefix
    pub destination_address: String,
    pub destination_chain: String,
    /// Bridge gas fee in drops
    pub gas_fee_amount: u64,
    pub payload: Option<[u8; 32]>,
}

impl Instruction {
    pub fn build(
        kind: InstructionKind,
        destination_address: &str,
        destination_chain: &str,
        gas_fee_amount: u64,
    ) -> Result<Self, InstructionError> {
        let stripped = without_hex_prefix(destination_address)
            .ok()
            .filter(|hex| hex.len() == 40)
            .ok_or_else(|| {
                InstructionError::InvalidDestinationAddress(destination_address.to_string())
            })?;

        if destination_chain.is_empty() {
            return Err(InstructionError::EmptyDestinationChain);
        }

        let payload = match kind {
            InstructionKind::Transfer(intent) => Some(intent.selector()),
            InstructionKind::Donate => None,
        };

        Ok(Self {
            kind,
            destination_address: stripped.to_string(),
            destination_chain: destination_chain.to_string(),
            gas_fee_amount,
            payload,
        })
    }

    /// Encode as memos in canonical order
    pub fn to_memos(&self, encoding: AddressEncoding) -> Result<Vec<Memo>, InstructionError> {
        let mut memos = vec![
            Memo::text(FIELD_TYPE, MEMO_TYPE_INTERCHAIN_TRANSFER),
            Memo::with_hex_data(
                FIELD_DESTINATION_ADDRESS,
                encode_address(&self.destination_address, encoding)?,
            ),
            Memo::text(FIELD_DESTINATION_CHAIN, &self.destination_chain),
            Memo::text(FIELD_GAS_FEE_AMOUNT, &self.gas_fee_amount.to_string()),
        ];

        if let Some(payload) = &self.payload {
            memos.push(Memo::with_hex_data(FIELD_PAYLOAD, hex::encode(payload)));
        }

        Ok(memos)
    }

    /// Parse memos back into an instruction. Fields are matched by name, so
    /// order does not matter.
    pub fn from_memos(memos: &[Memo], encoding: AddressEncoding) -> Result<Self, InstructionError> {
        let mut fields: HashMap<String, &str> = HashMap::new();
        for memo in memos {
            let name = memo.name()?;
            if fields.insert(name.clone(), memo.memo_data.as_str()).is_some() {
                return Err(MemoError::DuplicateField(name).into());
            }
        }

        let field = |name: &'static str| {
            fields
                .get(name)
                .copied()
                .ok_or(InstructionError::Memo(MemoError::MissingField(name)))
        };

        let message_type = decode_field(field(FIELD_TYPE)?)?;
        if message_type != MEMO_TYPE_INTERCHAIN_TRANSFER {
            return Err(InstructionError::UnsupportedType(message_type));
        }

        let destination_address =
            decode_address(field(FIELD_DESTINATION_ADDRESS)?, encoding)?;
        let destination_chain = decode_field(field(FIELD_DESTINATION_CHAIN)?)?;
        let gas_fee = decode_field(field(FIELD_GAS_FEE_AMOUNT)?)?;
        let gas_fee_amount: u64 = gas_fee
            .parse()
            .map_err(|_| InstructionError::InvalidGasFee(gas_fee.clone()))?;

        let kind = match fields.get(FIELD_PAYLOAD) {
            None => InstructionKind::Donate,
            Some(data) => {
                let bytes = hex::decode(data)
                    .map_err(|_| InstructionError::InvalidPayload(data.to_string()))?;
                let selector: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| InstructionError::InvalidPayload(data.to_string()))?;
                let intent = Intent::from_selector(&selector)
                    .ok_or_else(|| InstructionError::InvalidPayload(data.to_string()))?;
                InstructionKind::Transfer(intent)
            }
        };

        Self::build(kind, &destination_address, &destination_chain, gas_fee_amount)
    }
}

/// XRPL `Payment` description handed to the ledger client for
/// autofill, signing and submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Payment {
    pub transaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Drops, as a decimal string
    pub amount: String,
    /// Bridge multisig account
    pub destination: String,
    pub memos: Vec<MemoWrapper>,
}

impl Payment {
    pub fn new(
        account: Option<&str>,
        bridge_address: &str,
        amount_drops: u64,
        instruction: &Instruction,
        encoding: AddressEncoding,
    ) -> Result<Self, InstructionError> {
        if let Some(account) = account {
            XrplAddress::parse(account).map_err(|_| InstructionError::InvalidXrplAddress {
                field: "account",
                value: account.to_string(),
            })?;
        }
        XrplAddress::parse(bridge_address).map_err(|_| InstructionError::InvalidXrplAddress {
            field: "destination",
            value: bridge_address.to_string(),
        })?;
        if amount_drops == 0 {
            return Err(InstructionError::ZeroAmount);
        }

        Ok(Self {
            transaction_type: "Payment".to_string(),
            account: account.map(str::to_string),
            amount: amount_drops.to_string(),
            destination: bridge_address.to_string(),
            memos: instruction
                .to_memos(encoding)?
                .into_iter()
                .map(Memo::wrap)
                .collect(),
        })
    }

    /// Decode the instruction carried by this payment's memos
    pub fn instruction(&self, encoding: AddressEncoding) -> Result<Instruction, InstructionError> {
        let memos: Vec<Memo> = self.memos.iter().map(|w| w.memo.clone()).collect();
        Instruction::from_memos(&memos, encoding)
    }
}
