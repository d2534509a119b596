//! Command implementations
//!
//! Outbound commands only build the XRPL `Payment`; autofill, signing and
//! submission are left to the user's ledger client. `withdraw` signs a claim
//! locally and posts it to the withdraw relayer.

use eyre::{eyre, Result, WrapErr};
use interchain_rs::{
    xrp_to_drops, AddressEncoding, Instruction, InstructionKind, Intent, Memo, MemoWrapper,
    Payment, WithdrawalClaim, XrplAddress,
};
use k256::ecdsa::SigningKey;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// XRP sent by `fund-withdraw-relayer`
pub const RELAYER_FUNDING_XRP: &str = "50";

/// Shared options for commands that build a bridge payment
#[derive(Debug, Clone)]
pub struct OutboundOptions {
    pub account: Option<String>,
    pub bridge_address: String,
    pub destination_chain: String,
    pub gas_fee_drops: u64,
    pub encoding: AddressEncoding,
}

/// Build the payment for a deposit or donation of `amount_xrp`
pub fn build_payment(
    kind: InstructionKind,
    amount_xrp: &str,
    evm_destination: &str,
    options: &OutboundOptions,
) -> Result<Payment> {
    let drops = xrp_to_drops(amount_xrp)?;
    let instruction = Instruction::build(
        kind,
        evm_destination,
        &options.destination_chain,
        options.gas_fee_drops,
    )?;

    let payment = Payment::new(
        options.account.as_deref(),
        &options.bridge_address,
        drops,
        &instruction,
        options.encoding,
    )?;

    debug!(drops, kind = ?kind, "Built bridge payment");
    Ok(payment)
}

pub fn deposit_kind() -> InstructionKind {
    InstructionKind::Transfer(Intent::Deposit)
}

/// Parse `XRPL_SECRET_KEY`: 32-byte secp256k1 secret as hex
pub fn signing_key_from_hex(secret_hex: &str) -> Result<SigningKey> {
    let trimmed = secret_hex.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(stripped).wrap_err("XRPL secret key is not hex")?;
    SigningKey::from_slice(&bytes).map_err(|_| eyre!("XRPL secret key is not a valid secp256k1 key"))
}

/// Sign a withdrawal claim, defaulting the account to the key's own address
pub fn sign_claim(
    key: &SigningKey,
    amount_xrp: &str,
    account: Option<&str>,
    timestamp_ms: u64,
) -> Result<WithdrawalClaim> {
    // Fail early on amounts the relayer would reject
    xrp_to_drops(amount_xrp)?;

    let account = match account {
        Some(a) => XrplAddress::parse(a)?.to_classic(),
        None => XrplAddress::from_public_key(key.verifying_key()).to_classic(),
    };

    WithdrawalClaim::sign(key, &account, amount_xrp, timestamp_ms)
        .map_err(|e| eyre!("Failed to sign claim: {}", e))
}

/// POST a claim to the relayer and describe the outcome
pub async fn submit_claim(relayer_url: &str, claim: &WithdrawalClaim) -> Result<String> {
    info!(relayer = %relayer_url, account = %claim.account, "Submitting withdrawal claim");

    let response = reqwest::Client::new()
        .post(relayer_url)
        .json(claim)
        .send()
        .await
        .wrap_err("Error communicating with withdraw relayer")?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .wrap_err("Withdraw relayer returned a non-JSON response")?;

    describe_relayer_response(status.as_u16(), &body)
}

/// Render the relayer's JSON response, or an error for non-success statuses
pub fn describe_relayer_response(status: u16, body: &Value) -> Result<String> {
    if status == 200 && body["success"] == true {
        return Ok(format!(
            "Withdraw transaction submitted successfully:\n\
             - Transaction Hash: {}\n\
             - Block Number: {}\n\
             - Gas Used: {}",
            body["transactionHash"].as_str().unwrap_or("?"),
            body["blockNumber"],
            body["gasUsed"].as_str().unwrap_or("?"),
        ));
    }

    let error = body["error"].as_str().unwrap_or("unknown error");
    match body["details"].as_str() {
        Some(details) => Err(eyre!("Withdraw request failed ({}): {}: {}", status, error, details)),
        None => Err(eyre!("Withdraw request failed ({}): {}", status, error)),
    }
}

/// Memos as they appear in a transaction or on their own
#[derive(Deserialize)]
#[serde(untagged)]
enum MemoInput {
    Payment {
        #[serde(rename = "Memos")]
        memos: Vec<MemoWrapper>,
    },
    Wrapped(Vec<MemoWrapper>),
    Bare(Vec<Memo>),
}

/// Human-readable dump of a memo list, plus the decoded instruction when the
/// memos form one
pub fn decode_memos(input: &str, encoding: AddressEncoding) -> Result<String> {
    let parsed: MemoInput =
        serde_json::from_str(input).wrap_err("Expected a Payment, or a JSON array of memos")?;
    let memos: Vec<Memo> = match parsed {
        MemoInput::Payment { memos } | MemoInput::Wrapped(memos) => {
            memos.into_iter().map(|w| w.memo).collect()
        }
        MemoInput::Bare(memos) => memos,
    };

    let mut out = String::new();
    for memo in &memos {
        let name = memo.name().unwrap_or_else(|_| memo.memo_type.clone());
        let value = interchain_rs::memo::decode_field(&memo.memo_data)
            .unwrap_or_else(|_| format!("0x{}", memo.memo_data));
        out.push_str(&format!("{}: {}\n", name, value));
    }

    match Instruction::from_memos(&memos, encoding) {
        Ok(instruction) => {
            let kind = match instruction.kind {
                InstructionKind::Transfer(intent) => intent.as_str(),
                InstructionKind::Donate => "donate",
            };
            out.push_str(&format!(
                "=> {} to 0x{} on {} (gas fee {} drops)\n",
                kind,
                instruction.destination_address,
                instruction.destination_chain,
                instruction.gas_fee_amount
            ));
        }
        Err(e) => out.push_str(&format!("=> not a bridge instruction: {}\n", e)),
    }

    Ok(out)
}
