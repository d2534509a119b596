//! XRPL Withdraw Relayer
//!
//! HTTP service that turns signed withdrawal claims from XRPL account holders
//! into `withdraw` calls on the EVM sidechain bridge contract.
//!
//! # Flow
//!
//! 1. On startup the relayer makes sure the destination contract may spend
//!    its tokens (one `approve` if the allowance is low)
//! 2. A user signs `{account, requestedAmount, timestamp}` with their XRPL key
//!    and POSTs it to `/withdraw`
//! 3. The relayer verifies the signature, the signer's ownership of the
//!    account and the claim's age, then calls `withdraw` with the amount
//!    scaled to 18 decimals
//! 4. The bridge pays the withdrawal out on XRPL

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use withdraw_relayer::approval::ApprovalGate;
use withdraw_relayer::config::Config;
use withdraw_relayer::evm_client::{DestinationChain, EvmDestination};
use withdraw_relayer::relay::{RelaySettings, WithdrawRelay};
use withdraw_relayer::server::{self, AppState, Metrics};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting XRPL Withdraw Relayer");

    let config = Config::load()?;
    info!(
        rpc_url = %config.rpc_url,
        contract = %config.contract_address,
        token = %config.token_address,
        signer_binding = ?config.signer_binding,
        "Configuration loaded"
    );

    let chain: Arc<dyn DestinationChain> = Arc::new(EvmDestination::new(&config)?);
    let relayer_address = chain.relayer_address().to_string();

    let gate = Arc::new(ApprovalGate::new(
        chain.clone(),
        Duration::from_secs(config.chain_call_timeout_secs),
    ));

    // Kick off approval now; requests wait on the same outcome
    let startup_gate = gate.clone();
    tokio::spawn(async move {
        if let Err(e) = startup_gate.ensure_approved().await {
            warn!(error = %e, "Startup approval did not succeed");
        }
    });

    let relay = Arc::new(WithdrawRelay::new(
        chain,
        gate,
        RelaySettings::from_config(&config),
    ));

    let state = AppState {
        relay,
        metrics: Arc::new(Metrics::new()),
        relayer_address,
    };

    server::start_server(
        &config.bind_address,
        config.port,
        state,
        wait_for_shutdown_signal(),
    )
    .await?;

    info!("XRPL Withdraw Relayer stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,withdraw_relayer=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
