use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use landing::checkpoint::{load_or_init, FileCheckpointStore};
use landing::config::{default_data_dir, LandingConfig};
use landing::distribution::{DistributionContext, DistributionController};
use landing::logging::{init_tracing, LogFormat};
use landing::rpc::NodeRpcClient;
use landing::util::time_source::SystemTimeSource;

/// Periodically distribute funds from a reserve account.
#[derive(Debug, Parser)]
#[command(name = "landing", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, short, env = "LANDING_CONFIG")]
    config: PathBuf,

    /// Directory holding the checkpoint file.
    #[arg(long, env = "LANDING_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Node RPC endpoint, overrides the config file.
    #[arg(long)]
    rpc_url: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "LANDING_LOG_FORMAT")]
    log_format: LogFormat,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format, &args.log_level)?;

    let mut config = LandingConfig::load(&args.config)?;
    config.apply_env()?;
    if let Some(url) = args.rpc_url {
        config.rpc.url = url;
    }
    config.validate()?;
    config.rpc.validate()?;

    let data_dir = args
        .data_dir
        .or_else(default_data_dir)
        .context("no data directory given and no default could be determined")?;
    let checkpoint_path = config.checkpoint_path(&data_dir);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config, checkpoint_path))
}

async fn run(config: LandingConfig, checkpoint_path: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(FileCheckpointStore::new(checkpoint_path));
    let initial = config.initial_checkpoint();
    let load_store = store.clone();
    let checkpoint = tokio::task::spawn_blocking(move || load_or_init(load_store.as_ref(), initial))
        .await?
        .with_context(|| format!("failed to initialise checkpoint {}", store.path().display()))?;

    let rpc = Arc::new(NodeRpcClient::new(&config.rpc).context("failed to create RPC client")?);
    let ctx = DistributionContext {
        ledger: rpc.clone(),
        submitter: rpc,
        store,
        time_source: Arc::new(SystemTimeSource),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = Arc::new(DistributionController::new(
        ctx,
        config.distribution.clone(),
        checkpoint,
        shutdown_rx,
    ));
    let worker = tokio::spawn(controller.clone().run());

    wait_for_signal().await;
    tracing::info!("Shutdown requested, waiting for the current distribution cycle");
    let _ = shutdown_tx.send(true);
    worker.await.context("distribution controller panicked")?;

    let status = controller.status();
    if status.persistence_degraded {
        tracing::warn!(last = status.checkpoint.last, "Exited with checkpoint persistence degraded");
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM, only ctrl-c stops the distributor");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
