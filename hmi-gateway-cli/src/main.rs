//! HMI Gateway CLI Application
//!
//! Runs the gateway against a real CAN interface and renders the
//! display sink on the console. It uses the hmi-gateway library and
//! adds:
//! - TOML configuration loading with command-line overrides
//! - A console renderer standing in for the dashboard UI
//! - An interactive command loop for driver intents

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod console;

use hmi_gateway::sink::sink_channel;
use hmi_gateway::transport::{BusTransport, InMemoryTransport};
use hmi_gateway::{Gateway, GatewayConfig, SignalDatabase};

/// HMI Gateway - bridge a vehicle CAN bus to a dashboard
#[derive(Parser, Debug)]
#[command(name = "hmi-gateway-cli")]
#[command(about = "Vehicle HMI CAN gateway with a console dashboard", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (gateway.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CAN interface name (overrides the config file)
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Path to the DBC file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// Use an in-memory loopback bus instead of SocketCAN; transmitted
    /// frames feed straight back into the ingress side
    #[arg(long = "virtual")]
    virtual_bus: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("HMI Gateway CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using gateway library v{}", hmi_gateway::VERSION);

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    if let Some(dbc) = args.dbc {
        config.dbc_path = dbc;
    }

    // A missing or unparseable database is fatal; nothing can be
    // decoded or sent without it.
    let database = Arc::new(
        SignalDatabase::from_dbc_file(&config.dbc_path)
            .with_context(|| format!("Failed to load DBC file: {:?}", config.dbc_path))?,
    );

    let (rx_transport, tx_transport): (Box<dyn BusTransport>, Box<dyn BusTransport>) =
        if args.virtual_bus {
            log::info!("Using in-memory loopback bus");
            let (egress_end, ingress_end) = InMemoryTransport::pair();
            (Box::new(ingress_end), Box::new(egress_end))
        } else {
            open_transports(&config)?
        };

    let (publisher, events) = sink_channel();
    let console_handle = std::thread::Builder::new()
        .name("hmi-console".to_string())
        .spawn(move || console::run_console(events))?;

    let gateway = Gateway::start(&config, database, rx_transport, tx_transport, publisher)
        .context("Failed to start gateway")?;

    print_help();
    command_loop(&gateway);

    gateway.shutdown();
    // The last sink publisher is gone; the console drains and exits
    if console_handle.join().is_err() {
        log::error!("Console thread panicked");
    }
    Ok(())
}

/// Open the ingress and egress bus endpoints.
///
/// Two sockets on the same interface, so each worker thread owns its
/// endpoint outright.
#[cfg(target_os = "linux")]
fn open_transports(
    config: &GatewayConfig,
) -> Result<(Box<dyn BusTransport>, Box<dyn BusTransport>)> {
    use hmi_gateway::transport::open_socketcan_with_retry;
    use std::time::Duration;

    let delay = Duration::from_millis(config.open_backoff_ms);
    let rx = open_socketcan_with_retry(&config.interface, config.open_retries, delay)?;
    let tx = open_socketcan_with_retry(&config.interface, config.open_retries, delay)?;
    Ok((Box::new(rx), Box::new(tx)))
}

#[cfg(not(target_os = "linux"))]
fn open_transports(
    config: &GatewayConfig,
) -> Result<(Box<dyn BusTransport>, Box<dyn BusTransport>)> {
    anyhow::bail!(
        "SocketCAN interface '{}' is only available on Linux",
        config.interface
    );
}

/// Read driver commands from stdin until quit or EOF
fn command_loop(gateway: &Gateway) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["quit"] | ["exit"] | ["q"] => break,
            ["help"] => print_help(),
            ["status"] => print_status(gateway),
            ["set", name, state] => match parse_on_off(state) {
                Some(active) => {
                    gateway.set_intent(name, active);
                    println!("  {} -> {}", name, state);
                }
                None => println!("Expected 'on' or 'off', got '{}'", state),
            },
            _ => println!("Unknown command: '{}' (try 'help')", line.trim()),
        }
    }
}

fn parse_on_off(state: &str) -> Option<bool> {
    match state {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn print_help() {
    println!("Commands:");
    println!("  set <intent> on|off   activate or clear a driver intent");
    println!("  status                show intents and alarm state");
    println!("  help                  show this help");
    println!("  quit                  stop the gateway and exit");
}

fn print_status(gateway: &Gateway) {
    println!("Intents:");
    for (name, active) in gateway.intents() {
        println!("  {:<24} {}", name, if active { "on" } else { "off" });
    }
    let alarm = gateway.alarm_snapshot();
    if alarm.active {
        println!(
            "Alarm: ACTIVE (first={}, second={})",
            alarm.first, alarm.second
        );
        if let Some(message) = alarm.message {
            println!("  {}", message.replace('\n', "\n  "));
        }
    } else {
        println!("Alarm: inactive");
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
