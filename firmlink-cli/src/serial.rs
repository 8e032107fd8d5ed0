//! Serial port selection.
//!
//! Resolution order:
//! - explicit `--port` (or `FIRMLINK_PORT`)
//! - `[connection] port` from configuration
//! - the classified port list, with a timed prompt that falls back to the
//!   default choice (WiFi, then Bluetooth, then anything) when nobody answers
//!
//! Non-interactive mode and non-terminal sessions never prompt.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::{Term, style},
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    firmlink::{
        ClassifiedPorts, PortDescriptor, device,
        device::{await_choice_with_countdown, select_default},
        discover_ports,
    },
    log::{debug, info},
    std::{io::IsTerminal, sync::mpsc, thread, time::Duration},
};

/// Default time to wait for a port choice.
pub const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (never prompt).
    pub non_interactive: bool,
    /// Prompt deadline; `None` prompts without a deadline.
    pub select_timeout: Option<Duration>,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Select a serial port.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<PortDescriptor> {
    if let Some(port_name) = &options.port {
        return Ok(find_port_by_name(port_name));
    }

    if let Some(port_name) = &config
        .connection
        .port
    {
        debug!("Using port from config: {port_name}");
        return Ok(find_port_by_name(port_name));
    }

    let ports = discover_ports();
    if ports.is_empty() || options.non_interactive || !is_interactive_terminal() {
        return default_port(&ports);
    }

    print_port_list(&ports);
    match options.select_timeout {
        Some(timeout) => select_port_timed(&ports, timeout),
        None => select_port_interactive(&ports),
    }
}

/// The default port, or `NoDeviceFound` when nothing is connected.
fn default_port(ports: &ClassifiedPorts) -> Result<PortDescriptor> {
    Ok(select_default(ports)?)
}

fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

fn print_port_list(ports: &ClassifiedPorts) {
    eprintln!(
        "{} Found {} serial port(s):",
        style("ℹ").blue(),
        ports.len()
    );
    for entry in device::format_port_list(ports) {
        eprintln!("{entry}");
    }
}

/// Ask for an index on a helper thread; silence past `timeout` picks the
/// default port.
fn select_port_timed(ports: &ClassifiedPorts, timeout: Duration) -> Result<PortDescriptor> {
    eprintln!(
        "{}",
        style(format!(
            "Enter a port number, or press Enter for the default ({}s timeout):",
            timeout.as_secs()
        ))
        .dim()
    );

    let (tx, rx) = mpsc::channel();
    // The helper stays blocked on stdin after a timeout; it exits with the
    // process.
    thread::Builder::new()
        .name("firmlink-port-prompt".to_string())
        .spawn(move || {
            if let Ok(line) = Term::stderr().read_line() {
                let _ = tx.send(line);
            }
        })?;

    let choice = await_choice_with_countdown(&rx, timeout, |secs| {
        eprint!("\rWaiting for input... {secs:2} seconds remaining ");
    });
    eprintln!();
    if choice.is_none() {
        info!("No selection made, using the default port");
    }
    ports
        .resolve_choice(choice.as_deref())
        .map_err(|e| usage_err(&e.to_string()))
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Port selection cancelled".to_string()).into()
            } else {
                usage_err("Port selection prompt failed")
            }
        },
    }
}

/// Arrow-key selection without a deadline.
fn select_port_interactive(ports: &ClassifiedPorts) -> Result<PortDescriptor> {
    let all = ports.all();
    let term_width = Term::stderr()
        .size()
        .1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = all
        .iter()
        .map(|port| {
            let label = format!(
                "{} [{}]",
                port.label(),
                style(port.category).yellow()
            );
            console::truncate_str(&label, max_item_width, "\u{2026}").into_owned()
        })
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => all
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("Port selection cancelled".to_string()).into()),
    }
}

/// Look `name` up among the enumerated ports; unknown names are still used
/// as given.
fn find_port_by_name(name: &str) -> PortDescriptor {
    let ports = discover_ports().all();

    if let Some(port) = ports
        .iter()
        .find(|p| p.name == name)
    {
        return port.clone();
    }

    // Windows port names are case-insensitive
    if let Some(port) = ports
        .iter()
        .find(|p| {
            p.name
                .eq_ignore_ascii_case(name)
        })
    {
        return port.clone();
    }

    PortDescriptor::new(name, "n/a")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_port_wins_over_config() {
        let mut config = Config::default();
        config.connection.port = Some("CONFIG_PORT_XYZ".to_string());
        let options = SerialOptions {
            port: Some("CLI_PORT_XYZ".to_string()),
            ..SerialOptions::default()
        };
        let port = select_serial_port(&options, &config).unwrap();
        assert_eq!(port.name, "CLI_PORT_XYZ");
    }

    #[test]
    fn test_config_port_used_when_no_flag() {
        let mut config = Config::default();
        config.connection.port = Some("CONFIG_PORT_XYZ".to_string());
        let port = select_serial_port(&SerialOptions::default(), &config).unwrap();
        assert_eq!(port.name, "CONFIG_PORT_XYZ");
        assert_eq!(port.description, "n/a");
    }

    #[test]
    fn test_no_ports_is_a_device_error() {
        let err = default_port(&ClassifiedPorts::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<firmlink::Error>(),
            Some(firmlink::Error::NoDeviceFound)
        ));
        assert_eq!(crate::exit_code_for(&err), 4);
    }

    #[test]
    fn test_usage_error_maps_to_cli_error() {
        let err = usage_err("bad");
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }
}
