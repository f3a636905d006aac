// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DirectBridge CLI
//
// `run` drives an in-process bridge against a fixture SDK: one JSON command
// per stdin line, one JSON event per stdout line.  `page` and `script` print
// the WebView assets for a native host.  Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use directbridge_bridge::{
    Bridge, Fixture, FixtureSdk, HostFlavor, InProcessRuntime, bridge_script, host_page,
};
use directbridge_core::{BridgeConfig, Command, PreReadyPolicy};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bridge configuration file (JSON).  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands from stdin and print the events they produce.
    Run(RunArgs),
    /// Print the host page for a WebView.
    Page {
        #[arg(long, value_enum)]
        flavor: Flavor,
    },
    /// Print the bridge script injected once the page is ready.
    Script {
        #[arg(long, value_enum)]
        flavor: Flavor,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Scripted SDK responses (JSON).  Without one, every call is rejected.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Public key for commands that do not carry one.
    #[arg(long)]
    key: Option<String>,

    /// Queue commands sent before the runtime is ready instead of dropping them.
    #[arg(long)]
    queue: bool,

    /// Delay the runtime's load signal.
    #[arg(long, default_value_t = 0)]
    load_delay_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Flavor {
    Android,
    Ios,
    ReactNative,
}

impl From<Flavor> for HostFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Android => HostFlavor::Android,
            Flavor::Ios => HostFlavor::Ios,
            Flavor::ReactNative => HostFlavor::ReactNative,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(
        platform = directbridge_bridge::target_platform(),
        version = env!("CARGO_PKG_VERSION"),
        "DirectBridge starting"
    );
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Commands::Page { flavor } => print!("{}", host_page(&config, flavor.into())),
        Commands::Script { flavor } => print!("{}", bridge_script(&config, flavor.into())),
        Commands::Run(args) => {
            if args.queue {
                config.pre_ready_policy = PreReadyPolicy::Queue;
            }
            run(config, args).await?;
        }
    }
    Ok(())
}

async fn run(config: BridgeConfig, args: RunArgs) -> Result<()> {
    let fixture = match &args.fixture {
        Some(path) => Fixture::load(path)
            .with_context(|| format!("loading fixture {}", path.display()))?,
        None => Fixture::default(),
    };
    let runtime = Arc::new(InProcessRuntime::new(Arc::new(FixtureSdk::new(fixture)))?);
    let bridge = Bridge::new(config, runtime.clone())?;

    if args.load_delay_ms == 0 {
        runtime.loaded()?;
    } else {
        let delay = Duration::from_millis(args.load_delay_ms);
        let runtime = runtime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = runtime.loaded() {
                tracing::error!(error = %e, "load signal failed");
            }
        });
    }

    let mut calls = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match parse_command(line, args.key.as_deref()) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("skipping input line: {e:#}");
                continue;
            }
        };
        let bridge = bridge.clone();
        calls.spawn(async move { bridge.call(command).await });
    }

    while let Some(joined) = calls.join_next().await {
        match joined? {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(e) => tracing::error!(error = %e, "call failed"),
        }
    }
    Ok(())
}

/// Parse one input line, filling in `default_key` when the command has none.
fn parse_command(line: &str, default_key: Option<&str>) -> Result<Command> {
    let mut value: Value = serde_json::from_str(line).context("command is not JSON")?;
    if let (Some(key), Some(object)) = (default_key, value.as_object_mut()) {
        object
            .entry("key")
            .or_insert_with(|| Value::from(key));
    }
    serde_json::from_value(value).context("not a valid command")
}
