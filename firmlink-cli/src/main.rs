//! firmlink CLI - Drive and verify serial-attached microcontroller firmware.
//!
//! ## Features
//!
//! - Classified serial port listing and timed port selection
//! - Pin commands and cancellable pin toggling
//! - Live device output monitoring
//! - Firmware handshake, blink timing and boot block verification
//! - Shell completion generation
//! - Environment variable and TOML configuration support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use firmlink::{PortDescriptor, SerialConfig};
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

mod commands;
mod config;
mod serial;

use config::Config;
use serial::{DEFAULT_SELECT_TIMEOUT, SerialOptions, select_serial_port};

/// Whether Ctrl-C was received.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if spinners and colors should be used.
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user pressed Ctrl-C.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// CLI errors with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing setup; exit code 2.
    #[error("{0}")]
    Usage(String),
    /// Cancelled by the user; exit code 130.
    #[error("{0}")]
    Cancelled(String),
}

/// firmlink - Control and verify serial-attached microcontrollers.
///
/// Environment variables:
///   FIRMLINK_PORT              - Default serial port
///   FIRMLINK_BAUD              - Default baud rate (default: 9600)
///   FIRMLINK_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "firmlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port to use (auto-selected if not specified).
    #[arg(short, long, global = true, env = "FIRMLINK_PORT")]
    port: Option<String>,

    /// Baud rate (default: 9600).
    #[arg(short, long, global = true, env = "FIRMLINK_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (never prompt for a port).
    #[arg(long, global = true, env = "FIRMLINK_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Seconds to wait for a port choice before using the default (0 waits forever).
    #[arg(long, global = true, value_name = "SECS")]
    select_timeout: Option<u64>,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List available serial ports by category.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Send a greeting and print the first reply.
    Probe {
        /// Message to send.
        #[arg(long, default_value = firmlink::session::PROBE_MESSAGE)]
        message: String,

        /// Seconds to wait for a reply.
        #[arg(long, default_value = "2")]
        wait: f64,
    },

    /// Set a pin on or off.
    Send {
        /// Pin number (2-13 digital, 14-19 analog).
        pin: u8,

        /// Pin state.
        #[arg(value_parser = parse_pin_state)]
        state: firmlink::PinState,
    },

    /// Toggle a pin until interrupted.
    Toggle {
        /// Pin number (2-13 digital, 14-19 analog).
        pin: u8,

        /// Seconds the pin stays on.
        #[arg(long, default_value = "1")]
        on: f64,

        /// Seconds the pin stays off.
        #[arg(long, default_value = "1")]
        off: f64,
    },

    /// Print device output until interrupted.
    Monitor,

    /// Verify firmware banners and LED blink timing.
    Verify {
        /// Seconds to wait for both banners.
        #[arg(long)]
        handshake_timeout: Option<u64>,

        /// Blink markers to sample (at least 2).
        #[arg(long)]
        blinks: Option<usize>,

        /// Seconds to wait for the blink markers (0 waits forever).
        #[arg(long, value_name = "SECS")]
        blink_timeout: Option<u64>,

        /// Check the boot block first and abort on a mismatch.
        #[arg(long)]
        boot_check: bool,

        /// Baud rate for the boot check (default: 57600).
        #[arg(long)]
        boot_baud: Option<u32>,
    },

    /// Compare the board's boot block with the StandardFirmata signature.
    BootCheck {
        /// Baud rate for the boot check (default: 57600).
        #[arg(long)]
        boot_baud: Option<u32>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (auto-detected from $SHELL if not specified).
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

fn parse_pin_state(s: &str) -> Result<firmlink::PinState, String> {
    s.parse::<firmlink::PinState>()
        .map_err(|e| e.to_string())
}

/// Map an error chain to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => 2,
            CliError::Cancelled(_) => 130,
        };
    }
    match err.downcast_ref::<firmlink::Error>() {
        Some(firmlink::Error::Interrupted) => 130,
        Some(
            firmlink::Error::InvalidPin { .. }
            | firmlink::Error::InvalidDuration { .. }
            | firmlink::Error::Config(_),
        ) => 2,
        Some(firmlink::Error::NoDeviceFound | firmlink::Error::Connection { .. }) => 4,
        _ => 1,
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Failed to install Ctrl-C handler: {e}");
    }
    firmlink::set_interrupt_checker(was_interrupted);
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);
    install_interrupt_handler();

    debug!(
        "firmlink v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code_for(&err))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_with_override(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::Probe { message, wait } => {
            commands::control::cmd_probe(cli, &config, message, *wait)
        },
        Commands::Send { pin, state } => commands::control::cmd_send(cli, &config, *pin, *state),
        Commands::Toggle { pin, on, off } => {
            commands::control::cmd_toggle(cli, &config, *pin, *on, *off)
        },
        Commands::Monitor => commands::monitor::cmd_monitor(cli, &config),
        Commands::Verify {
            handshake_timeout,
            blinks,
            blink_timeout,
            boot_check,
            boot_baud,
        } => {
            let options = commands::verify::VerifyOptions {
                handshake_timeout: handshake_timeout.map(Duration::from_secs),
                blinks: *blinks,
                blink_timeout: blink_timeout.map(config::blink_timeout),
                boot_check: *boot_check,
                boot_baud: *boot_baud,
            };
            commands::verify::cmd_verify(cli, &config, &options)
        },
        Commands::BootCheck { boot_baud } => {
            commands::verify::cmd_boot_check(cli, &config, *boot_baud)
        },
        Commands::Completions { shell } => commands::completions::cmd_completions(*shell),
    }
}

/// Resolve the port to use for this invocation.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<PortDescriptor> {
    let timeout_secs = cli
        .select_timeout
        .or(config
            .connection
            .select_timeout_secs);
    let options = SerialOptions {
        port: cli
            .port
            .clone(),
        non_interactive: cli.non_interactive,
        select_timeout: match timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_SELECT_TIMEOUT),
        },
    };
    select_serial_port(&options, config)
}

/// Serial settings for `port` from flags, config and defaults.
pub(crate) fn serial_config(cli: &Cli, config: &Config, port: &str, baud: Option<u32>) -> SerialConfig {
    let baud = baud
        .or(cli.baud)
        .or(config
            .connection
            .baud)
        .unwrap_or(firmlink::port::DEFAULT_BAUD);
    let timeout = config
        .connection
        .timeout_ms
        .map_or(firmlink::port::DEFAULT_READ_TIMEOUT, Duration::from_millis);
    SerialConfig::new(port, baud).with_timeout(timeout)
}

impl Cli {
    /// Whether status output is suppressed.
    pub(crate) fn quiet(&self) -> bool {
        self.quiet
    }
}
