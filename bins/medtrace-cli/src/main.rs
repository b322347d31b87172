// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! MedTrace CLI
//!
//! Publish a ledger instance, register and transfer batches, and verify
//! provenance from the command line.
//!
//! Exit codes: 0 ok, 1 ledger or I/O failure, 2 invalid input, 3 duplicate
//! batch, 4 batch not found, 5 unauthorized.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medtrace_app_core::config::ConfigService;
use medtrace_app_core::node::{NodeConfig, NODE_CONFIG_KEY};
use medtrace_config_fs::FsConfigStore;
use medtrace_core::{
    BatchId, ErrorKind, EventKind, FileLedger, Identity, InvalidInput, LedgerError,
    LedgerInstanceId, Receipt, Registry, RegistryError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "MedTrace batch provenance CLI")]
struct Cli {
    /// Ledger file (defaults to the node config's ledger)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    /// Expected ledger instance id (hex)
    #[arg(long, global = true)]
    instance: Option<String>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a new, empty ledger instance and print its id
    Init {
        /// Human label mixed into the instance id
        #[arg(long, default_value = "medtrace")]
        label: String,
    },
    /// Register a new batch owned by the caller
    Create {
        /// Caller address
        #[arg(long = "as", value_name = "ADDR")]
        caller: String,
        id: String,
        name: String,
        manufacturer: String,
    },
    /// Hand a batch to a new owner (caller must be the current owner)
    Transfer {
        /// Caller address
        #[arg(long = "as", value_name = "ADDR")]
        caller: String,
        id: String,
        new_owner: String,
    },
    /// Show a batch's current record
    Get {
        id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show a batch's provenance trail
    History {
        id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Re-validate the whole ledger file
    Verify,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<RegistryError>() {
        return match err.kind() {
            ErrorKind::DuplicateBatch => 3,
            ErrorKind::BatchNotFound => 4,
            ErrorKind::Unauthorized => 5,
            ErrorKind::InvalidInput => 2,
            ErrorKind::Ledger => 1,
        };
    }
    if err.downcast_ref::<InvalidInput>().is_some() {
        return 2;
    }
    1
}

fn ledger_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    match FsConfigStore::new() {
        Ok(store) => {
            let base = store.base().to_path_buf();
            let node = ConfigService::new(store)
                .load::<NodeConfig>(NODE_CONFIG_KEY)
                .ok()
                .flatten()
                .unwrap_or_default();
            node.resolve_ledger_path(&base)
        }
        Err(_) => NodeConfig::default().ledger_path,
    }
}

/// Writers lock the file; readers take a snapshot so they work beside a
/// running daemon.
fn open(path: &Path, instance: Option<&str>, write: bool) -> Result<Registry<FileLedger>> {
    let expected = instance.map(LedgerInstanceId::parse).transpose()?;
    let ledger = match (write, expected) {
        (true, Some(expected)) => FileLedger::open_instance(path, expected),
        (true, None) => FileLedger::open(path),
        (false, expected) => FileLedger::open_read_only(path, expected),
    };
    let ledger = ledger
        .map_err(RegistryError::from)
        .with_context(|| format!("open ledger {}", path.display()))?;
    Ok(Registry::new(ledger))
}

fn print_receipt(verb: &str, id: &BatchId, receipt: &Receipt) {
    println!("{verb} {id} (seq {}, entry {})", receipt.seq, receipt.entry_hash);
}

fn run(cli: Cli) -> Result<()> {
    let path = ledger_path(cli.ledger);
    let instance = cli.instance.as_deref();

    match cli.cmd {
        Command::Init { label } => {
            let ledger = FileLedger::create(&path, &label)
                .map_err(RegistryError::from)
                .with_context(|| format!("publish ledger {}", path.display()))?;
            println!("{}", ledger.instance_id());
        }
        Command::Create {
            caller,
            id,
            name,
            manufacturer,
        } => {
            let caller = Identity::parse(&caller)?;
            let id = BatchId::new(id)?;
            let registry = open(&path, instance, true)?;
            let receipt = registry.create(id.clone(), &name, &manufacturer, caller)?;
            print_receipt("created", &id, &receipt);
        }
        Command::Transfer {
            caller,
            id,
            new_owner,
        } => {
            let caller = Identity::parse(&caller)?;
            let new_owner = Identity::parse(&new_owner)?;
            let id = BatchId::new(id)?;
            let registry = open(&path, instance, true)?;
            let receipt = registry.transfer(&id, new_owner, caller)?;
            print_receipt("transferred", &id, &receipt);
        }
        Command::Get { id, json } => {
            let id = BatchId::new(id)?;
            let registry = open(&path, instance, false)?;
            let verification = registry.query().verify(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&verification)?);
            } else if let Some(batch) = verification.batch() {
                println!("id:           {}", batch.id());
                println!("name:         {}", batch.name());
                println!("manufacturer: {}", batch.manufacturer());
                println!("owner:        {}", batch.owner());
            }
            if !verification.is_found() {
                return Err(RegistryError::BatchNotFound(id).into());
            }
        }
        Command::History { id, json } => {
            let id = BatchId::new(id)?;
            let registry = open(&path, instance, false)?;
            let events = registry.history(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                for event in events {
                    match event.kind {
                        EventKind::Created { owner } => {
                            println!("#{} created by {owner}", event.seq);
                        }
                        EventKind::Transferred { from, to } => {
                            println!("#{} transferred {from} -> {to}", event.seq);
                        }
                    }
                }
            }
        }
        Command::Verify => {
            let summary = FileLedger::verify(&path)
                .map_err(RegistryError::from)
                .with_context(|| format!("verify ledger {}", path.display()))?;
            if let Some(hex) = instance {
                let expected = LedgerInstanceId::parse(hex)?;
                if expected != summary.instance {
                    return Err(RegistryError::from(LedgerError::InstanceMismatch {
                        expected,
                        found: summary.instance,
                    })
                    .into());
                }
            }
            println!("ok: instance {}", summary.instance);
            println!("entries: {}", summary.head.seq);
            println!("batches: {}", summary.batches);
            println!("head:    {}", summary.head.head_hash);
        }
    }
    Ok(())
}
