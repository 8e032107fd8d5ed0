//! `list-ports` command.

use anyhow::Result;
use console::style;
use firmlink::{Category, ClassifiedPorts, PortDescriptor, device, discover_ports};

fn category_style(category: Category) -> console::StyledObject<&'static str> {
    let name = category.name();
    match category {
        Category::Wireless => style(name).green(),
        Category::Bluetooth => style(name).blue(),
        Category::Other => style(name).dim(),
    }
}

fn print_port(index: usize, port: &PortDescriptor) {
    eprintln!(
        "  {} {} - {} [{}]",
        style(format!("[{index}]")).dim(),
        style(&port.name).cyan(),
        port.description,
        category_style(port.category)
    );
    eprintln!(
        "      VID:PID = {}",
        device::format_vid_pid(port.vid, port.pid)
    );
    if let Some(manufacturer) = &port.manufacturer {
        eprintln!("      Manufacturer = {manufacturer}");
    }
    if let Some(serial) = &port.serial_number {
        eprintln!("      Serial Number = {serial}");
    }
}

/// Name of the port commands use when none is given.
fn default_port_name(ports: &ClassifiedPorts) -> Option<String> {
    device::select_default(ports)
        .ok()
        .map(|port| port.name)
}

/// List classified ports; JSON goes to stdout, human output to stderr.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = discover_ports();

    if json {
        println!("{}", serde_json::to_string_pretty(&ports.all())?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());
    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for (index, port) in ports
        .all()
        .iter()
        .enumerate()
    {
        print_port(index, port);
    }

    if let Some(default) = default_port_name(&ports) {
        eprintln!(
            "\n{} Default: {}",
            style("→").green().bold(),
            style(default).cyan().bold()
        );
    }
    Ok(())
}
