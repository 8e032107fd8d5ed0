//! `probe`, `send` and `toggle` commands.

use anyhow::{Context, Result};
use console::style;
use firmlink::{DutyCycle, PinState, ReaderEvent, ToggleEvent};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::{board_layout, describe_pin, open_session};
use crate::config::Config;
use crate::{Cli, CliError, was_interrupted};

/// How often the foreground loop checks for Ctrl-C.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

fn parse_wait(wait: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(wait)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| CliError::Usage(format!("Invalid --wait value: {wait}")).into())
}

/// Send a greeting and print the first reply.
pub(crate) fn cmd_probe(cli: &Cli, config: &Config, message: &str, wait: f64) -> Result<()> {
    let wait = parse_wait(wait)?;
    let mut session = open_session(cli, config, None, Arc::new(|_| {}))?;

    if !cli.quiet() {
        eprintln!("{} Sent: {message}", style("→").cyan());
    }
    match session
        .probe(message, wait)
        .context("Probe failed")?
    {
        Some(reply) => println!("{reply}"),
        None => println!("[No response]"),
    }
    session.close();
    Ok(())
}

/// Set one pin.
pub(crate) fn cmd_send(cli: &Cli, config: &Config, pin: u8, state: PinState) -> Result<()> {
    // opening the port resets the board, so reject bad input first
    let layout = board_layout();
    let pin = layout.validate(pin)?;

    let session = open_session(cli, config, None, Arc::new(|_| {}))?;
    session.send(pin, state)?;
    if !cli.quiet() {
        eprintln!(
            "{} Pin {} set {}",
            style("✓").green(),
            describe_pin(&layout, pin),
            style(state).bold()
        );
    }
    Ok(())
}

/// Toggle a pin until Ctrl-C or a link failure.
pub(crate) fn cmd_toggle(cli: &Cli, config: &Config, pin: u8, on: f64, off: f64) -> Result<()> {
    let quiet = cli.quiet();
    let layout = board_layout();
    let pin = layout.validate(pin)?;
    let cycle = DutyCycle::from_secs_f64(on, off)?;

    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let failure_sink = Arc::clone(&failure);

    let mut session = open_session(
        cli,
        config,
        None,
        Arc::new(move |event| match event {
            ToggleEvent::State { pin, state } => {
                if !quiet {
                    eprintln!("{} Pin {pin} {state}", style("⏱").dim());
                }
            },
            ToggleEvent::LinkFailure { reason, .. } => {
                *failure_sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(reason);
            },
            ToggleEvent::Stopped { .. } => {},
        }),
    )?;

    session.attach_reader(Arc::new(|event| {
        if let ReaderEvent::Line(line) = event {
            println!("{line}");
        }
    }))?;
    session.start_toggle(pin, cycle.on(), cycle.off())?;
    if !quiet {
        eprintln!(
            "{} Toggling pin {} ({on}s on / {off}s off). Press Ctrl+C to stop.",
            style("⚡").yellow(),
            describe_pin(&layout, pin)
        );
    }

    while !was_interrupted()
        && session
            .scheduler()
            .is_running()
    {
        thread::sleep(INTERRUPT_POLL);
    }
    session.stop_toggle();
    session.close();

    let failure = failure
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(reason) = failure {
        anyhow::bail!("Toggling stopped: {reason}");
    }
    if !quiet {
        eprintln!(
            "{} Stopped toggling pin {}",
            style("✓").green(),
            describe_pin(&layout, pin)
        );
    }
    Ok(())
}
