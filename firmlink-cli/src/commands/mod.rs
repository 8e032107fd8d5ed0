//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod control;
pub(crate) mod monitor;
pub(crate) mod ports;
pub(crate) mod verify;

use anyhow::{Context, Result};
use console::style;
use firmlink::{BoardLayout, Session, ToggleSink};

use crate::config::Config;
use crate::{Cli, get_port, serial_config};

/// Pin layout of the controlled board.
pub(crate) fn board_layout() -> BoardLayout {
    BoardLayout::uno()
}

/// `13 (D13)`, or the bare number for pins outside the layout.
pub(crate) fn describe_pin(layout: &BoardLayout, pin: u8) -> String {
    layout
        .label(pin)
        .map_or_else(|| pin.to_string(), |label| format!("{pin} ({label})"))
}

/// Select a port and open a session on it.
pub(crate) fn open_session(
    cli: &Cli,
    config: &Config,
    baud: Option<u32>,
    toggle_sink: ToggleSink,
) -> Result<Session> {
    let port = get_port(cli, config)?;
    let serial = serial_config(cli, config, &port.name, baud);
    if !cli.quiet() {
        eprintln!(
            "{} Using {} ({}) at {} baud",
            style("🔌").cyan(),
            style(&port.name).green(),
            port.description,
            serial.baud_rate
        );
    }
    Session::open(&serial, board_layout(), toggle_sink)
        .with_context(|| format!("Failed to connect to {}", port.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_pin() {
        let layout = board_layout();
        assert_eq!(describe_pin(&layout, 13), "13 (D13)");
        assert_eq!(describe_pin(&layout, 15), "15 (A1)");
        assert_eq!(describe_pin(&layout, 42), "42");
    }
}
