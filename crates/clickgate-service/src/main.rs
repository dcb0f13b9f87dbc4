//! clickgate-service entry point.
//!
//! # Usage
//!
//! ```text
//! clickgate-service [OPTIONS]
//!
//! Options:
//!   --config <PATH>    Config file [env: CLICKGATE_CONFIG] [default: platform config dir]
//!   --dump [ARGS]...   Print a diagnostic dump (-h, -p, -a) and exit
//!   --dialog-poll-ms   Interval between confirmation dialog pumps [default: 50]
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                  -- --config or platform default
//!  └─ ServiceState::from_config()    -- catalog, adapter, registry, dialog
//!  └─ state.start()                  -- start_service + enable_input_enhance
//!  └─ dialog pump (Tokio interval)   -- until Ctrl-C
//!  └─ state.shutdown()               -- disable_input_enhance + exit_service
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clickgate_service::infrastructure::service_state::ServiceState;
use clickgate_service::infrastructure::storage::config::load_config;

#[derive(Debug, Parser)]
#[command(
    name = "clickgate-service",
    about = "Security component click verification service",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    ///
    /// Defaults to `config.toml` in the platform config directory.  A
    /// missing file yields a backend-less service with default settings.
    #[arg(long, env = "CLICKGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Print a diagnostic dump and exit.  Takes the dump options, e.g.
    /// `--dump -p`; with no options dumps everything.
    #[arg(long, num_args = 0.., allow_hyphen_values = true)]
    dump: Option<Vec<String>>,

    /// Milliseconds between confirmation dialog pumps.
    #[arg(long, default_value_t = 50, env = "CLICKGATE_DIALOG_POLL_MS")]
    dialog_poll_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let state = ServiceState::from_config(&config);

    if let Some(args) = cli.dump {
        print!("{}", state.dump(&args).await);
        return Ok(());
    }

    info!(
        input = %config.enhance.input,
        service = %config.enhance.service,
        client = %config.enhance.client,
        "clickgate service starting"
    );
    state.start();

    if config.service.dump_on_start {
        info!("startup dump:\n{}", state.dump(&[]).await);
    }

    let mut pump = tokio::time::interval(Duration::from_millis(cli.dialog_poll_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("clickgate service ready.  Press Ctrl-C to exit.");
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("failed to listen for the shutdown signal")?;
                info!("shutdown signal received");
                break;
            }
            _ = pump.tick() => {
                state.pump_dialog().await;
            }
        }
    }

    state.shutdown();
    info!("clickgate service stopped");
    Ok(())
}
