// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

// emunwa - CLI Client
// Command-line interface for emulators speaking the network access protocol

mod config;
mod output;
mod shell;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use emunwa_common::{
    format_hex_dump, format_host_port, parse_hex, parse_regions, ClientConfig, Command, EmuClient,
    Reply,
};
use emunwa_gui_core::{selftest, Action, AppCore, SelfTestOutcome, Session, EXPECTED_READOUT};

use output::{print_cores_table, print_event, print_memories_table, print_pairs, ConsoleHandler};

#[derive(Parser)]
#[command(name = "emunwa")]
#[command(about = "Emulator network access CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Emulator host (default from cli.toml, else 127.0.0.1)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Emulator port (default 65400)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show emulator information
    Info,
    /// Show emulation state
    Status,
    /// Show the loaded game
    GameInfo,
    /// Reset the emulated machine
    Reset,
    /// Stop emulation
    Stop,
    /// Pause emulation
    Pause,
    /// Resume emulation
    Resume,
    /// Reload the current game
    Reload,
    /// Load a game file (path as seen by the emulator)
    LoadGame { path: String },

    /// List available cores
    Cores {
        /// Only cores for this platform
        #[arg(short = 'P', long)]
        platform: Option<String>,

        /// Output as JSON for scripting
        #[arg(short, long)]
        json: bool,
    },
    /// Show information about a core
    CoreInfo { name: String },
    /// Show the loaded core
    CoreCurrent,
    /// Load a core by name
    LoadCore { name: String },
    /// Unload the current core
    UnloadCore,
    /// Reset the loaded core
    CoreReset,
    /// List the memories of the loaded core
    Memories {
        /// Output as JSON for scripting
        #[arg(short, long)]
        json: bool,
    },

    /// Read memory and print a hex dump
    Read {
        /// Memory name, e.g. WRAM
        memory: String,
        /// Regions as OFFSET[;LENGTH]... ($hex, 0xhex, decimal; -$n from the end)
        addresses: Option<String>,
    },
    /// Write hex bytes to memory
    Write {
        memory: String,
        /// Regions as OFFSET[;LENGTH]...
        addresses: String,
        /// Bytes as hex, e.g. "01 00" or 0100
        data: String,
    },

    /// Break into the debugger
    Break,
    /// Continue after a debugger break
    Continue,

    /// Print emulation state and game changes until Ctrl+C
    Watch,
    /// Run the WRAM read/write self-test
    Selftest,
    /// Interactive shell
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, quiet unless RUST_LOG says otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::CliConfig::load()?.with_overrides(cli.host, cli.port)?;

    match cli.command {
        Commands::Info => show_pairs(&config, Command::emu_info()).await?,
        Commands::Status => show_pairs(&config, Command::emu_status()).await?,
        Commands::GameInfo => show_game_info(&config).await?,
        Commands::Reset => run_simple(&config, Command::emu_reset(), "Emulator reset").await?,
        Commands::Stop => run_simple(&config, Command::emu_stop(), "Emulation stopped").await?,
        Commands::Pause => run_simple(&config, Command::emu_pause(), "Emulation paused").await?,
        Commands::Resume => {
            run_simple(&config, Command::emu_resume(), "Emulation resumed").await?
        }
        Commands::Reload => run_simple(&config, Command::emu_reload(), "Game reloaded").await?,
        Commands::LoadGame { path } => {
            let message = format!("Loaded {}", path);
            run_simple(&config, Command::load_game(&path), &message).await?
        }
        Commands::Cores { platform, json } => list_cores(&config, platform.as_deref(), json).await?,
        Commands::CoreInfo { name } => show_pairs(&config, Command::core_info(&name)).await?,
        Commands::CoreCurrent => show_pairs(&config, Command::core_current_info()).await?,
        Commands::LoadCore { name } => {
            let message = format!("Core '{}' loaded", name);
            run_simple(&config, Command::load_core(&name), &message).await?
        }
        Commands::UnloadCore => {
            run_simple(&config, Command::load_core(""), "Core unloaded").await?
        }
        Commands::CoreReset => run_simple(&config, Command::core_reset(), "Core reset").await?,
        Commands::Memories { json } => list_memories(&config, json).await?,
        Commands::Read { memory, addresses } => {
            read_memory(&config, &memory, addresses.as_deref().unwrap_or("")).await?
        }
        Commands::Write {
            memory,
            addresses,
            data,
        } => write_memory(&config, &memory, &addresses, &data).await?,
        Commands::Break => run_simple(&config, Command::debug_break(), "Break").await?,
        Commands::Continue => run_simple(&config, Command::debug_continue(), "Continue").await?,
        Commands::Watch => watch(&config).await?,
        Commands::Selftest => run_selftest(config).await?,
        Commands::Shell => run_shell(config).await?,
    }

    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Connect and announce the configured client name
async fn connect(config: &ClientConfig) -> Result<EmuClient> {
    let address = format_host_port(&config.host, config.port);
    let spinner = spinner(format!("Connecting to {} ...", address));

    let mut client = EmuClient::new(config.clone());
    let connected = client.connect_to_host(&config.host, config.port).await;
    spinner.finish_and_clear();
    connected.with_context(|| format!("Failed to connect to {}", address))?;

    if !config.client_name.is_empty() {
        // Older emulators don't know MY_NAME_IS; not fatal
        let reply = client.request(Command::my_name_is(&config.client_name)).await?;
        if let Some(error) = reply.error_message() {
            debug!("MY_NAME_IS rejected: {}", error);
        }
    }

    Ok(client)
}

/// Send one command and return its reply, turning error replies into errors
async fn request(client: &mut EmuClient, command: Command) -> Result<Reply> {
    let kind = command.kind;
    let reply = client
        .request(command)
        .await
        .with_context(|| format!("{} failed", kind))?;
    Ok(reply.into_result()?)
}

async fn one_shot(config: &ClientConfig, command: Command) -> Result<Reply> {
    let mut client = connect(config).await?;
    let reply = request(&mut client, command).await;
    client.disconnect_from_host().await;
    reply
}

async fn show_pairs(config: &ClientConfig, command: Command) -> Result<()> {
    let reply = one_shot(config, command).await?;
    if reply.ascii().is_empty() {
        println!("{}", "(empty reply)".dimmed());
    } else {
        print_pairs(reply.ascii());
    }
    Ok(())
}

async fn show_game_info(config: &ClientConfig) -> Result<()> {
    let reply = one_shot(config, Command::game_info()).await?;
    if reply.to_map().get("name").map_or(true, |n| n.is_empty()) {
        println!("{}", "No game loaded.".yellow());
        return Ok(());
    }
    print_pairs(reply.ascii());
    Ok(())
}

async fn run_simple(config: &ClientConfig, command: Command, message: &str) -> Result<()> {
    one_shot(config, command).await?;
    println!("{}", format!("✓ {}", message).green().bold());
    Ok(())
}

async fn list_cores(config: &ClientConfig, platform: Option<&str>, json: bool) -> Result<()> {
    let reply = one_shot(config, Command::cores_list(platform)).await?;
    let cores: Vec<_> = reply
        .to_map_list()
        .into_iter()
        .filter(|m| m.contains_key("name"))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&cores)?);
    } else {
        print_cores_table(&cores);
    }
    Ok(())
}

async fn list_memories(config: &ClientConfig, json: bool) -> Result<()> {
    let reply = one_shot(config, Command::core_memories()).await?;
    let memories: Vec<_> = reply
        .to_map_list()
        .into_iter()
        .filter(|m| m.contains_key("name"))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
    } else {
        print_memories_table(&memories);
    }
    Ok(())
}

async fn read_memory(config: &ClientConfig, memory: &str, addresses: &str) -> Result<()> {
    let regions = parse_regions(addresses).context("Invalid address list")?;
    let reply = one_shot(config, Command::core_read(memory, &regions)).await?;
    match reply.binary() {
        Some(data) if data.is_empty() => println!("{}", "(no data)".dimmed()),
        Some(data) => println!("{}", format_hex_dump(data)),
        None => anyhow::bail!("Expected binary data, got: {}", reply.ascii().join(", ")),
    }
    Ok(())
}

async fn write_memory(config: &ClientConfig, memory: &str, addresses: &str, data: &str) -> Result<()> {
    let regions = parse_regions(addresses).context("Invalid address list")?;
    let bytes = parse_hex(data).context("Invalid write data")?;
    let len = bytes.len();
    one_shot(config, Command::core_write(memory, &regions, bytes)).await?;
    println!(
        "{}",
        format!("✓ Wrote {} byte(s) to {}", len, memory).green().bold()
    );
    Ok(())
}

async fn watch(config: &ClientConfig) -> Result<()> {
    let mut client = connect(config).await?;
    let mut core = AppCore::new();
    core.on_connected();

    println!(
        "{}",
        format!(
            "Watching {}. Press Ctrl+C to stop.",
            format_host_port(&config.host, config.port)
        )
        .dimmed()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(config.poll_interval());

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                for command in [Command::emu_status(), Command::game_info()] {
                    let reply = client.request(command).await.context("Connection lost")?;
                    for event in core.apply_reply(&reply) {
                        print_event(&event);
                    }
                }
            }
        }
    }

    client.disconnect_from_host().await;
    Ok(())
}

async fn run_selftest(config: ClientConfig) -> Result<()> {
    let host = config.host.clone();
    let mut session = Session::new(config, Arc::new(ConsoleHandler::new(false)));

    let spinner = spinner(format!("Connecting to {} ...", host));
    session.dispatch(Action::ToggleConnection { host }).await;
    spinner.finish_and_clear();
    if !session.core().is_connected() {
        anyhow::bail!("{}", session.core().status_message);
    }

    let reply_timeout = session.client().config().reply_timeout();
    session.drain(reply_timeout).await?;
    if !session.core().read_write_test_available {
        anyhow::bail!("The loaded core has no writable WRAM");
    }

    let outcome = selftest::run(&mut session).await?;
    print_event(&outcome.to_event());
    match outcome {
        SelfTestOutcome::Passed => Ok(()),
        SelfTestOutcome::Failed { readout } => {
            println!("{}", "Expected:".bold());
            println!("{}", EXPECTED_READOUT);
            println!("{}", "Actual:".bold());
            println!("{}", readout);
            anyhow::bail!("Read/write self-test failed")
        }
        SelfTestOutcome::NotConnected => anyhow::bail!("Connection lost during the self-test"),
    }
}

async fn run_shell(config: ClientConfig) -> Result<()> {
    let host = config.host.clone();
    let mut session = Session::new(config, Arc::new(ConsoleHandler::new(true)));
    let (tx, rx) = mpsc::unbounded_channel();

    tx.send(Action::ToggleConnection { host: host.clone() })
        .context("Session closed")?;

    // dialoguer blocks, so the prompt lives on its own thread
    std::thread::spawn(move || shell::prompt_loop(tx, host));

    session.run(rx).await
}
