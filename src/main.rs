#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use swatch_order::bridge::relay::run_relay;
use swatch_order::bridge::{ConfigBridge, FileBridge};
use swatch_order::config::EngineConfig;
use swatch_order::constants;
use swatch_order::engine::apply_snapshot;
use swatch_order::host::{HostEvent, SimulatedPage};
use swatch_order::{Engine, EngineChannels, NormalizedOrder, Phase, TokenId};

#[derive(Parser, Debug)]
#[command(name = "swatch-order", version, about = "Inspect and reorder stored color tokens")]
struct Cli {
    /// Engine config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Settings store to read and write
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tokens in render order
    Show,

    /// Move one token to a new position and save the result
    Move { id: String, position: usize },

    /// Render the stored tokens into a simulated page and reconcile once
    Verify,
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    if let Some(settings) = cli.settings {
        config.settings_file = Some(settings);
    }
    info!(settings = %config.settings_path().display(), key = %config.setting_key, "Using settings store");

    match cli.command {
        Command::Show => show(&config),
        Command::Move { id, position } => move_token(&config, TokenId::new(id), position),
        Command::Verify => verify(config),
    }
}

fn show(config: &EngineConfig) -> Result<()> {
    let mut bridge = FileBridge::new(config.settings_path());
    let settings = bridge.get_setting(&config.setting_key)?;
    let order = NormalizedOrder::from_map(settings.tokens());

    if order.is_empty() {
        println!("no color tokens");
        return Ok(());
    }
    for (index, item) in order.items().iter().enumerate() {
        println!("{index:>3}  {:<24} {}", item.id, item.token.rgba);
    }

    let deleted = settings.tokens().len() - order.len();
    if deleted > 0 {
        println!("({deleted} deleted token(s) hidden)");
    }
    let misplaced = order.misplaced();
    if !misplaced.is_empty() {
        let names: Vec<&str> = misplaced.iter().map(TokenId::as_str).collect();
        println!("stored order values out of place: {}", names.join(", "));
    }
    Ok(())
}

fn move_token(config: &EngineConfig, id: TokenId, position: usize) -> Result<()> {
    let mut bridge = FileBridge::new(config.settings_path());
    let mut settings = bridge.get_setting(&config.setting_key)?;

    let mut snapshot = NormalizedOrder::from_map(settings.tokens()).ids().to_vec();
    let Some(from) = snapshot.iter().position(|candidate| *candidate == id) else {
        bail!("No color token with id '{id}'");
    };
    let moved = snapshot.remove(from);
    snapshot.insert(position.min(snapshot.len()), moved);

    let outcome = apply_snapshot(settings.tokens_mut(), &snapshot);
    if outcome.changed.is_empty() {
        println!("'{id}' is already at position {from}, nothing to save");
        return Ok(());
    }

    bridge.set_setting(constants::bridge::PERSIST, &config.setting_key, &settings)?;
    for change in &outcome.changed {
        println!("{:<24} {} -> {}", change.id, change.from, change.to);
    }
    Ok(())
}

fn verify(config: EngineConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build runtime")?;
    let local = tokio::task::LocalSet::new();

    let engine = local.block_on(&runtime, async move {
        let mut bridge = FileBridge::new(config.settings_path());
        let settings = bridge.get_setting(&config.setting_key)?;
        let page = SimulatedPage::new();

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_local(run_relay(bridge, config.setting_key.clone(), signal_rx, reply_tx));

        let wait = config.reset_cooldown() + config.settle_delay() + Duration::from_millis(100);
        let mut engine = Engine::new(config, page.clone(), page.clone(), signal_tx);
        let channels = EngineChannels {
            bridge: reply_rx,
            host_events: host_rx,
            mutations: page.mutations(),
        };
        let handle = tokio::task::spawn_local(async move {
            engine.run(channels).await;
            engine
        });

        page.render(&settings);
        tokio::time::sleep(wait).await;
        let _ = host_tx.send(HostEvent::Shutdown);
        handle.await.context("Engine task failed")
    })?;

    for diagnostic in engine.diagnostics() {
        println!("diagnostic: {diagnostic}");
    }
    match (engine.phase(), engine.order()) {
        (Phase::Bound, Some(order)) => {
            println!("verified: {} token(s) reconciled and draggable", order.len());
            Ok(())
        }
        (phase, _) => bail!("reconciliation did not complete (phase: {phase:?})"),
    }
}
