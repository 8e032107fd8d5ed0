//! `verify` and `boot-check` commands.

use anyhow::{Context, Result};
use console::style;
use firmlink::verify::BootOutcome;
use firmlink::{BlinkReport, HandshakeVerifier, Session, VerifyConfig, port::BOOT_CHECK_BAUD};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use super::open_session;
use crate::config::Config;
use crate::{Cli, use_fancy_output};

/// Flags of the `verify` command.
#[derive(Debug, Clone, Default)]
pub(crate) struct VerifyOptions {
    /// Overrides the configured handshake timeout.
    pub handshake_timeout: Option<Duration>,
    /// Overrides the configured blink count.
    pub blinks: Option<usize>,
    /// Overrides the configured blink phase budget.
    pub blink_timeout: Option<Duration>,
    /// Run the boot check first.
    pub boot_check: bool,
    /// Overrides the configured boot check baud rate.
    pub boot_baud: Option<u32>,
}

fn boot_baud(config: &Config, flag: Option<u32>) -> u32 {
    flag.or(config
        .verify
        .boot_baud)
        .unwrap_or(BOOT_CHECK_BAUD)
}

fn spinner(cli: &Cli) -> ProgressBar {
    if cli.quiet() || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_blink_report(report: &BlinkReport) {
    eprintln!("\n{}", style("Blink intervals").bold().underlined());
    for (i, interval) in report
        .intervals
        .iter()
        .enumerate()
    {
        eprintln!("  {:>2}. {:.3}s", i + 1, interval.as_secs_f64());
    }
    eprintln!(
        "  {} {:.3}s",
        style("Average:").bold(),
        report
            .average
            .as_secs_f64()
    );
}

/// Open a dedicated link at the boot baud and compare the boot block.
fn run_boot_check(cli: &Cli, config: &Config, baud: u32) -> Result<BootOutcome> {
    let mut session = open_session(cli, config, Some(baud), Arc::new(|_| {}))?;
    let verifier = HandshakeVerifier::new(VerifyConfig::default())?;
    let pb = spinner(cli);
    pb.set_message("Waiting for the boot block...");
    let outcome = verifier.check_boot(session.link());
    pb.finish_and_clear();
    session.close();
    Ok(outcome?)
}

/// Compare the boot block with the StandardFirmata signature.
pub(crate) fn cmd_boot_check(cli: &Cli, config: &Config, boot_baud_flag: Option<u32>) -> Result<()> {
    match run_boot_check(cli, config, boot_baud(config, boot_baud_flag))? {
        BootOutcome::Matched => {
            eprintln!("{} Boot sequence matches", style("✓").green().bold());
            Ok(())
        },
        BootOutcome::Mismatched(mismatch) => {
            eprintln!("{} {mismatch}", style("✗").red().bold());
            eprintln!("  Received: {}", style(&mismatch.received).dim());
            Err(firmlink::Error::BootMismatch(mismatch).into())
        },
    }
}

/// Verify banners and blink timing, optionally after a boot check.
pub(crate) fn cmd_verify(cli: &Cli, config: &Config, options: &VerifyOptions) -> Result<()> {
    if options.boot_check {
        if let BootOutcome::Mismatched(mismatch) =
            run_boot_check(cli, config, boot_baud(config, options.boot_baud))?
        {
            return Err(firmlink::Error::BootMismatch(mismatch).into());
        }
        if !cli.quiet() {
            eprintln!("{} Boot sequence matches", style("✓").green());
        }
    }

    let mut verify_config = config.verify_config();
    if let Some(timeout) = options.handshake_timeout {
        verify_config.handshake_timeout = timeout;
    }
    if let Some(blinks) = options.blinks {
        verify_config.blinks_to_verify = blinks;
    }
    if let Some(timeout) = options.blink_timeout {
        verify_config.blink_timeout = timeout;
    }
    debug!("Verifier settings: {verify_config:?}");

    let pb = spinner(cli);
    let line_pb = pb.clone();
    let blink_pb = pb.clone();
    let mut verifier = HandshakeVerifier::new(verify_config)?
        .with_line_observer(Box::new(move |line: &str| {
            line_pb.println(format!("  {}", style(line).dim()));
        }))
        .with_blink_observer(Box::new(move |seen: usize, target: usize| {
            blink_pb.set_message(format!("LED toggles {seen}/{target}"));
        }));

    let mut session: Session = open_session(cli, config, None, Arc::new(|_| {}))?;
    pb.set_message("Waiting for firmware banners...");
    let report = session
        .verify(&mut verifier)
        .with_context(|| format!("Verification failed on {}", session.link().name()));
    pb.finish_and_clear();
    session.close();
    let report = report?;

    eprintln!(
        "{} Firmware name and version verified on {}",
        style("✓").green().bold(),
        style(&report.port).cyan()
    );
    if let Some(blink) = &report.blink {
        if !cli.quiet() {
            print_blink_report(blink);
        }
        eprintln!("{} LED blink verified", style("✓").green().bold());
    }
    Ok(())
}
