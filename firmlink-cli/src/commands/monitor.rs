//! Serial monitor command implementation.
//!
//! Device lines go to stdout, status lines to stderr, so the output stays
//! pipeable.

use anyhow::Result;
use console::style;
use firmlink::{ReaderEvent, reader::channel_sink};
use std::io::{self, Write as _};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use super::open_session;
use crate::config::Config;
use crate::{Cli, was_interrupted};

/// How often the monitor checks for Ctrl-C while the device is silent.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Echo device output until Ctrl-C or the link closes.
pub(crate) fn cmd_monitor(cli: &Cli, config: &Config) -> Result<()> {
    let mut session = open_session(cli, config, None, Arc::new(|_| {}))?;
    if !cli.quiet() {
        eprintln!("{}", style("Press Ctrl+C to exit.").dim());
    }

    let (tx, rx) = mpsc::channel();
    session.attach_reader(channel_sink(tx))?;

    let mut out = io::stdout().lock();
    let closed = loop {
        if was_interrupted() {
            break None;
        }
        match rx.recv_timeout(INTERRUPT_POLL) {
            Ok(ReaderEvent::Line(line)) => {
                writeln!(out, "{line}")?;
                out.flush()?;
            },
            Ok(ReaderEvent::Closed { reason }) => break Some(reason),
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => break None,
        }
    };
    session.close();

    if let Some(reason) = closed {
        anyhow::bail!("Monitor stopped: {reason}");
    }
    if !cli.quiet() {
        eprintln!("\n{} Monitor closed", style("✓").green());
    }
    Ok(())
}
