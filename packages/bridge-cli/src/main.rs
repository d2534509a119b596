//! XRPL EVM Bridge CLI
//!
//! - `deposit` / `donate` / `fund-withdraw-relayer` print the XRPL Payment
//!   (with bridge memos) to sign and submit with your ledger client
//! - `withdraw` signs a withdrawal claim and sends it to the withdraw relayer
//! - `decode-memos` turns hex memos back into readable fields

mod commands;

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use interchain_rs::instruction::{DEFAULT_DESTINATION_CHAIN, DEFAULT_GAS_FEE_DROPS};
use interchain_rs::{AddressEncoding, InstructionKind};
use tracing_subscriber::EnvFilter;

use commands::{OutboundOptions, RELAYER_FUNDING_XRP};

#[derive(Parser)]
#[command(name = "xrpl-bridge")]
#[command(about = "Move XRP between the XRP Ledger and the XRPL EVM sidechain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Encoding {
    /// Hex of the address's ASCII hex
    HexOfHex,
    /// Address hex as-is
    Raw,
}

impl From<Encoding> for AddressEncoding {
    fn from(e: Encoding) -> Self {
        match e {
            Encoding::HexOfHex => AddressEncoding::HexOfHex,
            Encoding::Raw => AddressEncoding::Raw,
        }
    }
}

#[derive(clap::Args)]
struct PaymentArgs {
    /// EVM destination address (0x-prefixed or bare hex)
    #[arg(long)]
    destination: String,

    /// Sending XRPL account; omit to let the ledger client fill it in
    #[arg(long)]
    account: Option<String>,

    /// Bridge multisig account on XRPL
    #[arg(long, env = "BRIDGE_MULTISIG_ADDRESS")]
    bridge: String,

    #[arg(long, env = "DESTINATION_CHAIN", default_value = DEFAULT_DESTINATION_CHAIN)]
    destination_chain: String,

    /// Bridge gas fee in drops
    #[arg(long, default_value_t = DEFAULT_GAS_FEE_DROPS)]
    gas_fee_drops: u64,

    /// How the destination address is written into its memo
    #[arg(long, value_enum, default_value_t = Encoding::HexOfHex)]
    address_encoding: Encoding,
}

impl PaymentArgs {
    fn options(&self) -> OutboundOptions {
        OutboundOptions {
            account: self.account.clone(),
            bridge_address: self.bridge.clone(),
            destination_chain: self.destination_chain.clone(),
            gas_fee_drops: self.gas_fee_drops,
            encoding: self.address_encoding.into(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deposit XRP to an EVM address
    Deposit {
        /// Amount in XRP, e.g. 0.1
        #[arg(long)]
        amount: String,

        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Donate XRP to the bridge for an EVM address
    Donate {
        /// Amount in XRP, e.g. 0.1
        #[arg(long)]
        amount: String,

        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Donate 50 XRP to the withdraw relayer's EVM address
    FundWithdrawRelayer {
        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Sign a withdrawal claim and send it to the withdraw relayer
    Withdraw {
        /// Amount in XRP, e.g. 0.1
        #[arg(long)]
        amount: String,

        /// XRPL account to withdraw to; defaults to the key's own address
        #[arg(long)]
        account: Option<String>,

        /// secp256k1 secret key (hex) controlling the account
        #[arg(long, env = "XRPL_SECRET_KEY", hide_env_values = true)]
        secret_key: String,

        #[arg(
            long,
            env = "WITHDRAW_RELAYER_URL",
            default_value = "http://localhost:3000/withdraw"
        )]
        relayer_url: String,

        /// Print the signed claim instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Decode hex memos from a Payment or memo list (file, or stdin if omitted)
    DecodeMemos {
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Encoding::HexOfHex)]
        address_encoding: Encoding,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("Loaded {}", path.display());
    }

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Deposit { amount, payment } => {
            let tx = commands::build_payment(
                commands::deposit_kind(),
                &amount,
                &payment.destination,
                &payment.options(),
            )?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        Commands::Donate { amount, payment } => {
            let tx = commands::build_payment(
                InstructionKind::Donate,
                &amount,
                &payment.destination,
                &payment.options(),
            )?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        Commands::FundWithdrawRelayer { payment } => {
            let tx = commands::build_payment(
                InstructionKind::Donate,
                RELAYER_FUNDING_XRP,
                &payment.destination,
                &payment.options(),
            )?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        Commands::Withdraw {
            amount,
            account,
            secret_key,
            relayer_url,
            dry_run,
        } => {
            let key = commands::signing_key_from_hex(&secret_key)?;
            let now_ms = chrono::Utc::now().timestamp_millis() as u64;
            let claim = commands::sign_claim(&key, &amount, account.as_deref(), now_ms)?;

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&claim)?);
            } else {
                println!("{}", commands::submit_claim(&relayer_url, &claim).await?);
            }
        }
        Commands::DecodeMemos {
            file,
            address_encoding,
        } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            print!(
                "{}",
                commands::decode_memos(&input, address_encoding.into())?
            );
        }
    }

    Ok(())
}
