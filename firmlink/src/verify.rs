//! Firmware verification: boot block, banner handshake, blink timing.
//!
//! Verification runs in up to three phases on the caller's thread:
//!
//! 1. **Boot** (optional): right after the port opens, read the raw boot
//!    block and compare it bit for bit with a [`BootSignature`].
//! 2. **Handshake**: read lines until both the identity and the version
//!    banner were seen, in any order, or the handshake timeout elapses.
//! 3. **Blink timing**: collect `blinks_to_verify` blink markers, drop the
//!    interval before the first one and average the rest.
//!
//! ```text
//!                  name                 version
//! AwaitingIdentity ────▶ AwaitingVersion ──────▶ Verified
//!        │  ▲ version (stays, remembered)
//!        └──┘
//! any state ── deadline ──▶ Failed
//! ```
//!
//! The verifier must be the only reader of the link while it runs; see
//! [`crate::session::Session::verify`].

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::is_interrupted_requested;
use crate::link::SerialLink;
use crate::protocol::{
    Banners, BootMismatch, BootSignature, HandshakeToken, parse_blink_marker, parse_handshake_line,
};

/// Default number of blink markers to sample.
pub const DEFAULT_BLINKS_TO_VERIFY: usize = 5;

/// Default handshake budget.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for the blink phase.
pub const DEFAULT_BLINK_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for the boot block to arrive.
pub const DEFAULT_BOOT_WINDOW: Duration = Duration::from_secs(5);

/// Delay between opening the port and reading the boot block; opening the
/// port resets most boards.
pub const DEFAULT_BOOT_SETTLE: Duration = Duration::from_secs(2);

/// A line with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLine {
    /// When the line was read.
    pub at: Instant,
    /// Trimmed line text.
    pub text: String,
}

/// Source of timestamped lines for the verifier.
pub trait LineSource {
    /// Next line, or `None` if nothing arrived within one poll.
    fn next_line(&mut self) -> Result<Option<TimedLine>>;
}

impl LineSource for &SerialLink {
    fn next_line(&mut self) -> Result<Option<TimedLine>> {
        Ok(self
            .read_line()?
            .map(|text| TimedLine {
                at: Instant::now(),
                text,
            }))
    }
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HandshakeState {
    /// Identity banner not seen yet.
    AwaitingIdentity,
    /// Identity seen, version pending.
    AwaitingVersion,
    /// Both banners seen.
    Verified,
    /// Deadline passed without both banners. Terminal.
    Failed,
}

/// Order-independent banner tracker.
#[derive(Debug, Clone)]
pub struct HandshakeTracker {
    banners: Banners,
    identity_seen: bool,
    version_seen: bool,
    state: HandshakeState,
}

impl HandshakeTracker {
    /// Start awaiting `banners`.
    pub fn new(banners: Banners) -> Self {
        Self {
            banners,
            identity_seen: false,
            version_seen: false,
            state: HandshakeState::AwaitingIdentity,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Feed one line.
    pub fn observe(&mut self, line: &str) -> HandshakeState {
        if matches!(self.state, HandshakeState::Verified | HandshakeState::Failed) {
            return self.state;
        }
        match parse_handshake_line(line, &self.banners) {
            HandshakeToken::Identity => self.identity_seen = true,
            HandshakeToken::Version => self.version_seen = true,
            HandshakeToken::Other => {},
        }
        self.state = match (self.identity_seen, self.version_seen) {
            (true, true) => HandshakeState::Verified,
            (true, false) => HandshakeState::AwaitingVersion,
            (false, _) => HandshakeState::AwaitingIdentity,
        };
        self.state
    }

    /// The deadline passed. Anything short of `Verified` becomes `Failed`.
    pub fn expire(&mut self) -> HandshakeState {
        if self.state != HandshakeState::Verified {
            self.state = HandshakeState::Failed;
        }
        self.state
    }

    /// One description per banner not yet seen.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.identity_seen {
            missing.push(format!("missing firmware name \"{}\"", self.banners.name));
        }
        if !self.version_seen {
            missing.push(format!("missing version \"{}\"", self.banners.version));
        }
        missing
    }
}

/// One observed blink marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkSample {
    /// Arrival time.
    pub at: Instant,
}

/// Interval statistics of a blink run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlinkReport {
    /// Time between consecutive markers, in arrival order.
    pub intervals: Vec<Duration>,
    /// Arithmetic mean of `intervals`.
    pub average: Duration,
}

impl BlinkReport {
    /// Build a report from at least two samples.
    ///
    /// The wait before the first sample depends on when monitoring began, so
    /// only the gaps between samples are counted.
    pub fn from_samples(samples: &[BlinkSample]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(Error::Config(format!(
                "blink analysis needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        let intervals: Vec<Duration> = samples
            .windows(2)
            .map(|pair| {
                pair[1]
                    .at
                    .saturating_duration_since(pair[0].at)
            })
            .collect();
        let total: Duration = intervals
            .iter()
            .sum();
        let count = u32::try_from(intervals.len())
            .map_err(|_| Error::Config("too many blink samples".to_string()))?;
        Ok(Self {
            average: total / count,
            intervals,
        })
    }
}

/// What to do with the boot phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BootPolicy {
    /// Do not read the boot block.
    #[default]
    Skip,
    /// Compare and record the outcome, then continue.
    Report,
    /// Abort verification on a mismatch.
    Require,
}

/// Outcome of the boot phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// The block matched.
    Matched,
    /// The block differed.
    Mismatched(BootMismatch),
}

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Expected banners.
    pub banners: Banners,
    /// Budget for the handshake phase.
    pub handshake_timeout: Duration,
    /// Markers to sample in the blink phase; at least 2.
    pub blinks_to_verify: usize,
    /// Budget for the blink phase. `Duration::MAX` waits indefinitely.
    pub blink_timeout: Duration,
    /// Boot phase policy.
    pub boot_policy: BootPolicy,
    /// Expected boot block.
    pub boot_signature: BootSignature,
    /// Delay before reading the boot block.
    pub boot_settle: Duration,
    /// Time allowed for the boot block.
    pub boot_window: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            banners: Banners::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            blinks_to_verify: DEFAULT_BLINKS_TO_VERIFY,
            blink_timeout: DEFAULT_BLINK_TIMEOUT,
            boot_policy: BootPolicy::Skip,
            boot_signature: BootSignature::default(),
            boot_settle: DEFAULT_BOOT_SETTLE,
            boot_window: DEFAULT_BOOT_WINDOW,
        }
    }
}

/// Result of a full verification run.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Port the device was verified on.
    pub port: String,
    /// Boot phase outcome, if the phase ran.
    pub boot: Option<BootOutcome>,
    /// Final handshake state.
    pub handshake: HandshakeState,
    /// Blink statistics, if the blink phase ran.
    pub blink: Option<BlinkReport>,
}

/// Callback for every line read during verification.
pub type LineObserver = Box<dyn FnMut(&str) + Send>;

/// Drives the verification phases.
pub struct HandshakeVerifier {
    config: VerifyConfig,
    observer: Option<LineObserver>,
    blink_observer: Option<Box<dyn FnMut(usize, usize) + Send>>,
}

impl HandshakeVerifier {
    /// Create a verifier; rejects fewer than two blinks.
    pub fn new(config: VerifyConfig) -> Result<Self> {
        if config.blinks_to_verify < 2 {
            return Err(Error::Config(format!(
                "blinks_to_verify must be at least 2, got {}",
                config.blinks_to_verify
            )));
        }
        Ok(Self {
            config,
            observer: None,
            blink_observer: None,
        })
    }

    /// Observe every line the verifier reads.
    #[must_use]
    pub fn with_line_observer(mut self, observer: LineObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Observe blink progress as `(collected, target)`.
    #[must_use]
    pub fn with_blink_observer(mut self, observer: Box<dyn FnMut(usize, usize) + Send>) -> Self {
        self.blink_observer = Some(observer);
        self
    }

    /// Boot phase on a freshly opened link.
    ///
    /// Reads exactly as many bytes as the signature is long, so whatever the
    /// device prints after its boot block stays on the link for the
    /// handshake.
    pub fn check_boot(&self, link: &SerialLink) -> Result<BootOutcome> {
        if !self
            .config
            .boot_settle
            .is_zero()
        {
            debug!("Waiting {:?} for the board to boot", self.config.boot_settle);
            thread::sleep(self.config.boot_settle);
        }
        let expected = self
            .config
            .boot_signature
            .byte_len();
        let block = link.read_block(expected, self.config.boot_window)?;
        trace!("Boot block: {block:02X?}");
        match self
            .config
            .boot_signature
            .check(&block)
        {
            Ok(()) => {
                info!("Boot block matches ({} bytes)", block.len());
                Ok(BootOutcome::Matched)
            },
            Err(mismatch) => {
                warn!("Boot block mismatch: {mismatch}");
                Ok(BootOutcome::Mismatched(mismatch))
            },
        }
    }

    /// Handshake phase. `Ok(Verified)` or `ProtocolMismatch` naming every
    /// missing banner.
    pub fn await_handshake<S: LineSource>(&mut self, source: &mut S) -> Result<HandshakeState> {
        let mut tracker = HandshakeTracker::new(
            self.config
                .banners
                .clone(),
        );
        let deadline = Instant::now() + self.config.handshake_timeout;

        while Instant::now() < deadline {
            if is_interrupted_requested() {
                return Err(Error::Interrupted);
            }
            let Some(line) = source.next_line()? else {
                continue;
            };
            if line
                .text
                .is_empty()
            {
                continue;
            }
            self.notify(&line.text);
            let before = tracker.state();
            let after = tracker.observe(&line.text);
            if after != before {
                debug!("Handshake {before:?} -> {after:?}");
            }
            if after == HandshakeState::Verified {
                info!("Firmware name and version verified");
                return Ok(after);
            }
        }

        tracker.expire();
        let missing = tracker.missing();
        warn!("Handshake failed: {}", missing.join(", "));
        Err(Error::ProtocolMismatch { missing })
    }

    /// Blink phase: sample markers and compute interval statistics.
    pub fn monitor_blinks<S: LineSource>(&mut self, source: &mut S) -> Result<BlinkReport> {
        let target = self
            .config
            .blinks_to_verify;
        let deadline = Instant::now().checked_add(self.config.blink_timeout);
        let mut samples: Vec<BlinkSample> = Vec::with_capacity(target);

        info!("Monitoring LED blinking ({target} toggles)");
        while samples.len() < target {
            if is_interrupted_requested() {
                return Err(Error::Interrupted);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Error::Timeout(format!(
                    "observed {} of {target} blink markers within {:?}",
                    samples.len(),
                    self.config
                        .blink_timeout
                )));
            }
            let Some(line) = source.next_line()? else {
                continue;
            };
            self.notify(&line.text);
            if let Some(state) = parse_blink_marker(&line.text) {
                samples.push(BlinkSample { at: line.at });
                debug!("Blink marker {state} ({}/{target})", samples.len());
                if let Some(observer) = self
                    .blink_observer
                    .as_mut()
                {
                    observer(samples.len(), target);
                }
            }
        }

        let report = BlinkReport::from_samples(&samples)?;
        info!("LED blink verified, average interval {:?}", report.average);
        Ok(report)
    }

    /// Run every enabled phase against `link`.
    pub fn run(&mut self, link: &SerialLink) -> Result<VerificationReport> {
        let boot = match self
            .config
            .boot_policy
        {
            BootPolicy::Skip => None,
            policy => {
                let outcome = self.check_boot(link)?;
                if let (BootPolicy::Require, BootOutcome::Mismatched(mismatch)) = (policy, &outcome) {
                    return Err(Error::BootMismatch(mismatch.clone()));
                }
                Some(outcome)
            },
        };

        let mut source = link;
        let handshake = self.await_handshake(&mut source)?;
        let blink = self.monitor_blinks(&mut source)?;

        Ok(VerificationReport {
            port: link
                .name()
                .to_string(),
            boot,
            handshake,
            blink: Some(blink),
        })
    }

    fn notify(&mut self, line: &str) {
        trace!("Verifier received: {line}");
        if let Some(observer) = self
            .observer
            .as_mut()
        {
            observer(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::protocol::STANDARD_FIRMATA_BOOT;
    use std::collections::VecDeque;

    /// Replays lines, then reports nothing.
    struct Script {
        lines: VecDeque<TimedLine>,
    }

    impl Script {
        fn untimed(lines: &[&str]) -> Self {
            let now = Instant::now();
            Self::timed(lines.iter().map(|l| (now, *l)))
        }

        fn timed<'a>(lines: impl IntoIterator<Item = (Instant, &'a str)>) -> Self {
            Self {
                lines: lines
                    .into_iter()
                    .map(|(at, text)| TimedLine {
                        at,
                        text: text.to_string(),
                    })
                    .collect(),
            }
        }
    }

    impl LineSource for Script {
        fn next_line(&mut self) -> Result<Option<TimedLine>> {
            let next = self.lines.pop_front();
            if next.is_none() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(next)
        }
    }

    fn verifier(handshake_timeout: Duration) -> HandshakeVerifier {
        HandshakeVerifier::new(VerifyConfig {
            handshake_timeout,
            blink_timeout: Duration::from_millis(200),
            ..VerifyConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_handshake_verified_with_noise() {
        let mut source = Script::untimed(&["noise", "=== VishnuFirm ===", "Version: 1.0.0"]);
        let state = verifier(Duration::from_secs(5))
            .await_handshake(&mut source)
            .unwrap();
        assert_eq!(state, HandshakeState::Verified);
    }

    #[test]
    fn test_handshake_accepts_either_order() {
        let mut source = Script::untimed(&["Version: 1.0.0", "=== VishnuFirm ==="]);
        let state = verifier(Duration::from_secs(5))
            .await_handshake(&mut source)
            .unwrap();
        assert_eq!(state, HandshakeState::Verified);
    }

    #[test]
    fn test_handshake_reports_missing_version() {
        let mut source = Script::untimed(&["=== VishnuFirm ==="]);
        match verifier(Duration::from_millis(50)).await_handshake(&mut source) {
            Err(Error::ProtocolMismatch { missing }) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("missing version"));
            },
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_handshake_reports_both_missing() {
        let mut source = Script::untimed(&["=== VishnuFirm v2 ===", "Version: 1.0"]);
        match verifier(Duration::from_millis(50)).await_handshake(&mut source) {
            Err(Error::ProtocolMismatch { missing }) => {
                assert_eq!(missing.len(), 2);
                assert!(missing[0].contains("missing firmware name"));
            },
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_tracker_state_machine() {
        let mut tracker = HandshakeTracker::new(Banners::default());
        assert_eq!(tracker.state(), HandshakeState::AwaitingIdentity);
        assert_eq!(tracker.observe("Version: 1.0.0"), HandshakeState::AwaitingIdentity);
        assert_eq!(tracker.observe("noise"), HandshakeState::AwaitingIdentity);
        assert_eq!(tracker.observe("=== VishnuFirm ==="), HandshakeState::Verified);
        assert_eq!(tracker.expire(), HandshakeState::Verified);

        let mut tracker = HandshakeTracker::new(Banners::default());
        assert_eq!(tracker.observe("=== VishnuFirm ==="), HandshakeState::AwaitingVersion);
        assert_eq!(tracker.expire(), HandshakeState::Failed);
        // terminal
        assert_eq!(tracker.observe("Version: 1.0.0"), HandshakeState::Failed);
        assert_eq!(tracker.missing(), vec!["missing version \"Version: 1.0.0\"".to_string()]);
    }

    #[test]
    fn test_blink_average_over_steady_state_intervals() {
        let base = Instant::now();
        let markers = ["LED ON", "LED OFF", "LED ON", "LED OFF", "LED ON", "LED OFF"];
        let mut source = Script::timed(
            markers
                .iter()
                .enumerate()
                .map(|(i, m)| (base + Duration::from_secs(i as u64), *m)),
        );

        let report = verifier(Duration::from_secs(1))
            .monitor_blinks(&mut source)
            .unwrap();
        assert_eq!(report.intervals.len(), 4);
        assert!(report.intervals.iter().all(|d| *d == Duration::from_secs(1)));
        assert_eq!(report.average, Duration::from_secs(1));
        // the sixth marker is left for whoever reads next
        assert_eq!(source.lines.len(), 1);
    }

    #[test]
    fn test_blink_ignores_non_marker_lines() {
        let base = Instant::now();
        let mut source = Script::timed([
            (base, "LED ON"),
            (base + Duration::from_millis(100), "temp=21C"),
            (base + Duration::from_millis(500), "LED OFF"),
            (base + Duration::from_millis(1000), "LED ON"),
        ]);
        let mut verifier = HandshakeVerifier::new(VerifyConfig {
            blinks_to_verify: 3,
            ..VerifyConfig::default()
        })
        .unwrap();
        let report = verifier
            .monitor_blinks(&mut source)
            .unwrap();
        assert_eq!(report.intervals, vec![Duration::from_millis(500); 2]);
    }

    #[test]
    fn test_blink_timeout_names_progress() {
        let mut source = Script::untimed(&["LED ON", "LED OFF"]);
        match verifier(Duration::from_secs(1)).monitor_blinks(&mut source) {
            Err(Error::Timeout(msg)) => assert!(msg.contains("2 of 5")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_unbounded_blink_timeout() {
        let mut source = Script::untimed(&["LED ON", "LED OFF"]);
        let mut verifier = HandshakeVerifier::new(VerifyConfig {
            blinks_to_verify: 2,
            blink_timeout: Duration::MAX,
            ..VerifyConfig::default()
        })
        .unwrap();
        let report = verifier
            .monitor_blinks(&mut source)
            .unwrap();
        assert_eq!(report.intervals.len(), 1);
    }

    #[test]
    fn test_blink_count_must_be_at_least_two() {
        let config = VerifyConfig {
            blinks_to_verify: 1,
            ..VerifyConfig::default()
        };
        assert!(matches!(HandshakeVerifier::new(config), Err(Error::Config(_))));
        assert!(BlinkReport::from_samples(&[]).is_err());
    }

    fn boot_verifier(policy: BootPolicy) -> HandshakeVerifier {
        HandshakeVerifier::new(VerifyConfig {
            boot_policy: policy,
            boot_settle: Duration::ZERO,
            boot_window: Duration::from_millis(100),
            handshake_timeout: Duration::from_millis(100),
            blink_timeout: Duration::from_millis(100),
            ..VerifyConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_boot_block_match() {
        let device = MockPort::new("MOCK0");
        device.push_bytes(STANDARD_FIRMATA_BOOT);
        let link = SerialLink::from_port(Box::new(device)).unwrap();
        assert_eq!(
            boot_verifier(BootPolicy::Report)
                .check_boot(&link)
                .unwrap(),
            BootOutcome::Matched
        );
    }

    #[test]
    fn test_boot_single_bit_flip_is_reported() {
        let device = MockPort::new("MOCK0");
        let mut block = STANDARD_FIRMATA_BOOT.to_vec();
        block[0] ^= 0x01;
        device.push_bytes(&block);
        let link = SerialLink::from_port(Box::new(device)).unwrap();

        match boot_verifier(BootPolicy::Report)
            .check_boot(&link)
            .unwrap()
        {
            BootOutcome::Mismatched(m) => assert_eq!(m.first_difference, 7),
            BootOutcome::Matched => panic!("flipped bit must not match"),
        }
    }

    #[test]
    fn test_required_boot_mismatch_aborts_run() {
        let device = MockPort::new("MOCK0");
        device.push_bytes(&STANDARD_FIRMATA_BOOT[..10]);
        let link = SerialLink::from_port(Box::new(device)).unwrap();
        assert!(matches!(
            boot_verifier(BootPolicy::Require).run(&link),
            Err(Error::BootMismatch(_))
        ));
    }

    #[test]
    fn test_full_run_over_link() {
        let device = MockPort::new("MOCK0");
        device.push_line("booting");
        device.push_line("=== VishnuFirm ===");
        device.push_line("Version: 1.0.0");
        for i in 0..5 {
            device.push_line(if i % 2 == 0 { "LED ON" } else { "LED OFF" });
        }
        let link = SerialLink::from_port(Box::new(device)).unwrap();

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_by_observer = std::sync::Arc::clone(&seen);
        let mut verifier = verifier(Duration::from_secs(2)).with_line_observer(Box::new(move |line: &str| {
            seen_by_observer
                .lock()
                .unwrap()
                .push(line.to_string());
        }));

        let report = verifier
            .run(&link)
            .unwrap();
        assert_eq!(report.port, "MOCK0");
        assert_eq!(report.handshake, HandshakeState::Verified);
        assert!(report.boot.is_none());
        assert_eq!(
            report
                .blink
                .unwrap()
                .intervals
                .len(),
            4
        );
        assert_eq!(seen.lock().unwrap().len(), 8);
    }

    fn push_boot_then_firmware(device: &MockPort, boot: &[u8]) {
        device.push_bytes(boot);
        device.push_line("=== VishnuFirm ===");
        device.push_line("Version: 1.0.0");
        for i in 0..5 {
            device.push_line(if i % 2 == 0 { "LED ON" } else { "LED OFF" });
        }
    }

    #[test]
    fn test_boot_report_then_handshake_on_one_link() {
        let device = MockPort::new("MOCK0");
        push_boot_then_firmware(&device, STANDARD_FIRMATA_BOOT);
        let link = SerialLink::from_port(Box::new(device)).unwrap();

        let report = boot_verifier(BootPolicy::Report)
            .run(&link)
            .unwrap();
        assert_eq!(report.boot, Some(BootOutcome::Matched));
        assert_eq!(report.handshake, HandshakeState::Verified);
        assert!(report.blink.is_some());
    }

    #[test]
    fn test_reported_boot_mismatch_keeps_banners_for_handshake() {
        let device = MockPort::new("MOCK0");
        let mut block = STANDARD_FIRMATA_BOOT.to_vec();
        block[45] = 0x00;
        push_boot_then_firmware(&device, &block);
        let link = SerialLink::from_port(Box::new(device)).unwrap();

        let report = boot_verifier(BootPolicy::Report)
            .run(&link)
            .unwrap();
        match report.boot {
            Some(BootOutcome::Mismatched(m)) => {
                assert_eq!(m.received_bits, m.expected_bits);
                assert_eq!(m.first_difference, 45 * 8);
            },
            other => panic!("expected a mismatch, got {other:?}"),
        }
        assert_eq!(report.handshake, HandshakeState::Verified);
        assert!(report.blink.is_some());
    }
}
