//! Command-line driver for the slave controller.
//!
//! Connects to one slave over a serial port, sends commands, and runs the
//! 100 ms poll loop that collects responses. Session parameters come from an
//! optional YAML config file, overridable per flag.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use relaylink_protocol::{Command, Profile};
use relaylink_session::{list_ports, Session, SessionConfig, SessionEvent, POLL_INTERVAL};

/// Poll ticks to run after a one-shot command, enough for the response
/// round trip at the slowest supported baud.
const RESPONSE_TICKS: u32 = 5;

#[derive(Parser)]
#[command(name = "relaylink", version, about = "Drive a relaylink slave controller")]
struct Cli {
    /// YAML session config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port name (overrides the config file).
    #[arg(long)]
    port: Option<String>,

    /// Baud rate (overrides the config file).
    #[arg(long)]
    baud: Option<u32>,

    /// Addressing slave id (overrides the config file).
    #[arg(long)]
    slave_id: Option<u16>,

    /// Firmware profile, `a` or `b` (overrides the config file).
    #[arg(long, value_parser = parse_profile)]
    profile: Option<Profile>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List serial ports on this machine.
    Ports,

    /// Connect and stream status, slave-id, and input-line events.
    Watch,

    /// Pulse an output line (profile A).
    SetOutput {
        /// Output line number.
        name: u8,
        /// On time in 5 ms units.
        ton: u8,
        /// Off time in 5 ms units.
        toff: u8,
        /// Number of pulses.
        pulse_count: u8,
    },

    /// Set the operating mode (profile B).
    SetMode {
        /// Mode flag.
        enabled: bool,
    },

    /// Request an immediate input status report.
    ForceUpdate,

    /// Program a new slave address on the device.
    SetSlaveId {
        /// The new 16-bit address.
        id: u16,
    },

    /// Switch the device to a new serial speed.
    SetSpeed {
        /// Index into the supported baud table (0..=4).
        index: u8,
    },

    /// Set the key configuration bitmask (profile B).
    SetConfigBits {
        /// Combination of the configuration bits (0x00..=0x0F).
        bits: u8,
    },

    /// Run a timed key sequence (profile B).
    RunSequence {
        /// Key configuration applied for the sequence.
        config_bits: u8,
        /// Press time per step in 5 ms units.
        ton: u8,
        /// Release time per step in 5 ms units.
        toff: u8,
        /// Key states, one byte per step.
        #[arg(required = true)]
        steps: Vec<u8>,
    },
}

fn parse_profile(value: &str) -> Result<Profile, String> {
    match value {
        "a" | "A" => Ok(Profile::A),
        "b" | "B" => Ok(Profile::B),
        other => Err(format!("unknown profile '{}', expected 'a' or 'b'", other)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    if let CliCommand::Ports = cli.command {
        for port in list_ports() {
            println!("{}", port);
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    config.validate()?;
    let Some(port) = config.port.clone() else {
        bail!("no serial port given; pass --port or set it in the config file");
    };

    let mut session = Session::from_config(&config)?;
    session.connect(&port, config.baud)?;

    match cli.command {
        CliCommand::Ports => unreachable!("handled above"),

        CliCommand::Watch => watch(&mut session)?,

        CliCommand::SetSpeed { index } => {
            session.set_speed(index)?;
            await_response(&mut session);
        }

        CliCommand::SetSlaveId { id } => {
            session.set_slave_id(id)?;
            await_response(&mut session);
        }

        CliCommand::SetOutput {
            name,
            ton,
            toff,
            pulse_count,
        } => {
            session.send(&Command::SetOutput {
                name,
                ton,
                toff,
                pulse_count,
            })?;
            await_response(&mut session);
        }

        CliCommand::SetMode { enabled } => {
            session.send(&Command::SetMode { enabled })?;
            await_response(&mut session);
        }

        CliCommand::ForceUpdate => {
            session.send(&Command::ForceUpdate)?;
            await_response(&mut session);
        }

        CliCommand::SetConfigBits { bits } => {
            session.send(&Command::SetConfigBits { bits })?;
            await_response(&mut session);
        }

        CliCommand::RunSequence {
            config_bits,
            ton,
            toff,
            steps,
        } => {
            session.send(&Command::ExecuteSequence {
                config_bits,
                ton,
                toff,
                sequence: steps,
            })?;
            await_response(&mut session);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SessionConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    if let Some(slave_id) = cli.slave_id {
        config.slave_id = u32::from(slave_id);
    }
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    Ok(config)
}

/// Run the poll loop for a few ticks so the response lands, printing events.
fn await_response(session: &mut Session) {
    for _ in 0..RESPONSE_TICKS {
        session.poll();
        print_events(session);
        thread::sleep(POLL_INTERVAL);
    }
}

/// Poll until interrupted, printing events as they arrive.
fn watch(session: &mut Session) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let handle = running.clone();
    ctrlc::set_handler(move || handle.store(false, Ordering::SeqCst))
        .context("installing interrupt handler")?;

    while running.load(Ordering::SeqCst) {
        session.poll();
        print_events(session);
        thread::sleep(POLL_INTERVAL);
    }
    session.disconnect();
    Ok(())
}

fn print_events(session: &mut Session) {
    while let Some(event) = session.next_event() {
        match event {
            SessionEvent::StatusChanged { text, is_ready } => {
                println!("status: {}{}", text, if is_ready { "" } else { " !" });
            }
            SessionEvent::LastSlaveUpdated { id, confirmed } => {
                println!("last slave id: {}{}", id, if confirmed { "" } else { "?" });
            }
            SessionEvent::InputLineChanged { index, before, now } => {
                println!(
                    "input {}: {} -> {}",
                    index,
                    u8::from(before),
                    u8::from(now)
                );
            }
        }
    }
}
