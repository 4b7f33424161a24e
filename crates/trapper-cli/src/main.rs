//! CLI for trapper: push host metrics to a Zabbix collector.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trapper")]
#[command(about = "trapper - push host tick rates and event counts to a Zabbix collector")]
#[command(version = trapper_core::VERSION)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a host: tick at the configured cadence, fire random events,
    /// and send on the configured interval until Ctrl+C
    Run {
        /// JSON config file
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long)]
        duration: Option<u64>,

        /// Average simulated events per second
        #[arg(long, default_value = "5")]
        events_per_sec: u32,
    },

    /// Send key=value items once and print the collector's reply
    Send {
        /// JSON config file; without it defaults and TRAPPER_* variables apply
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the sender host name
        #[arg(long)]
        host: Option<String>,

        /// Item to send, as key=value (repeatable)
        #[arg(long = "item", required = true)]
        items: Vec<String>,
    },

    /// Render a request frame offline and print its header and body
    Frame {
        /// Sender host name
        #[arg(long)]
        host: String,

        /// Item to render, as key=value (repeatable)
        #[arg(long = "item")]
        items: Vec<String>,

        /// Pin request and item clocks to this epoch second
        #[arg(long)]
        clock: Option<i64>,

        /// Also print the header bytes in hex
        #[arg(long)]
        hex: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run {
            config,
            duration,
            events_per_sec,
        } => commands::run::run(&config, duration, events_per_sec),
        Commands::Send {
            config,
            host,
            items,
        } => commands::send::run(config.as_deref(), host.as_deref(), &items),
        Commands::Frame {
            host,
            items,
            clock,
            hex,
        } => commands::frame::run(&host, &items, clock, hex),
    }
}
