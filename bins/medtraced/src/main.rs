// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! MedTrace daemon (medtraced)
//!
//! Serves one batch-provenance ledger instance over HTTP. Settings come from
//! flags, then the saved node config, then defaults.

mod api;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use medtrace_app_core::config::ConfigService;
use medtrace_app_core::node::{NodeConfig, NodeOverrides, NODE_CONFIG_KEY};
use medtrace_config_fs::FsConfigStore;
use medtrace_core::{FileLedger, LedgerInstanceId, Registry};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "MedTrace ledger daemon")]
struct Args {
    /// Ledger file (relative paths resolve against the config dir)
    #[arg(long)]
    ledger: Option<PathBuf>,
    /// Expected ledger instance id (hex); a ledger file from another instance is refused
    #[arg(long)]
    instance: Option<String>,
    /// HTTP listener (e.g. 127.0.0.1:8545)
    #[arg(long)]
    listen: Option<String>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log: Option<String>,
    /// Publish a new ledger instance under this label if the ledger file is missing
    #[arg(long, value_name = "LABEL")]
    init: Option<String>,
}

impl Args {
    fn overrides(&self) -> NodeOverrides {
        NodeOverrides {
            ledger_path: self.ledger.clone(),
            instance_id: self.instance.clone(),
            listen: self.listen.clone(),
            log: self.log.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config (best-effort); defaults are persisted once if absent.
    let config: Option<ConfigService<FsConfigStore>> =
        FsConfigStore::new().map(ConfigService::new).ok();
    let (saved, wrote_defaults) = config
        .as_ref()
        .and_then(|c| c.load_or_init::<NodeConfig>(NODE_CONFIG_KEY).ok())
        .unwrap_or_default();
    let base = config
        .as_ref()
        .map_or_else(|| PathBuf::from("."), |c| c.store().base().to_path_buf());
    let node = saved.clone().merged(args.overrides());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&node.log))?)
        .init();

    match &config {
        None => warn!("config dir unavailable; running on defaults"),
        Some(_) if wrote_defaults => info!(dir = %base.display(), "wrote default node config"),
        Some(_) => {}
    }

    let ledger_path = node.resolve_ledger_path(&base);
    let ledger = open_ledger(&ledger_path, node.instance_id.as_deref(), args.init.as_deref())?;
    let state = api::AppState::new(Registry::new(ledger));
    info!(instance = %state.instance(), ledger = %ledger_path.display(), "ledger ready");

    // Pin the configured ledger's instance so later starts refuse a swapped file.
    if let (Some(cfg), None, None) = (&config, &saved.instance_id, &args.ledger) {
        let pinned = NodeConfig {
            instance_id: Some(state.instance().to_string()),
            ..saved
        };
        if let Err(err) = cfg.save(NODE_CONFIG_KEY, &pinned) {
            warn!(%err, "could not pin ledger instance in config");
        }
    }

    let listener = TcpListener::bind(&node.listen)
        .await
        .with_context(|| format!("bind {}", node.listen))?;
    info!("medtraced listening on {}", listener.local_addr()?);
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn open_ledger(path: &Path, instance: Option<&str>, init: Option<&str>) -> Result<FileLedger> {
    if let Some(label) = init {
        if !path.exists() {
            return FileLedger::create(path, label)
                .with_context(|| format!("publish ledger at {}", path.display()));
        }
        warn!(path = %path.display(), "ledger exists; --init ignored");
    }
    let ledger = match instance {
        Some(hex) => FileLedger::open_instance(path, LedgerInstanceId::parse(hex)?),
        None => FileLedger::open(path),
    };
    ledger.with_context(|| format!("open ledger at {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
