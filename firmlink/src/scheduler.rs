//! Cancellable on/off duty-cycle loop against one pin.
//!
//! ```text
//!        start(pin, on, off)              stop() / write failure
//! Idle ─────────────────────▶ Running ─────────────────────────▶ Idle
//! ```
//!
//! While running the job repeats: write ON, publish, wait `on`, write OFF,
//! publish, wait `off`. Waits block on a stop signal rather than a plain
//! sleep, so a stop request is honored no later than the end of the wait in
//! progress, and a stopped job never writes again.
//!
//! Only one job runs per scheduler. `start` stops and joins the previous job
//! before the new one issues its first command.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::board::BoardLayout;
use crate::error::{Error, Result};
use crate::link::SerialLink;
use crate::protocol::{PinCommand, PinState};

/// What a toggle job publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleEvent {
    /// A command was written successfully.
    State {
        /// Target pin.
        pin: u8,
        /// State just commanded.
        state: PinState,
    },
    /// A write failed; the job has ended.
    LinkFailure {
        /// Target pin.
        pin: u8,
        /// Transport error text.
        reason: String,
    },
    /// The job ended after a stop request.
    Stopped {
        /// Target pin.
        pin: u8,
    },
}

/// Consumer of toggle events.
pub type ToggleSink = Arc<dyn Fn(ToggleEvent) + Send + Sync>;

/// On and off durations of a toggle job. Both are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    on: Duration,
    off: Duration,
}

impl DutyCycle {
    /// Validate a pair of durations.
    pub fn new(on: Duration, off: Duration) -> Result<Self> {
        if on.is_zero() {
            return Err(Error::InvalidDuration {
                which: "on",
                value: 0.0,
            });
        }
        if off.is_zero() {
            return Err(Error::InvalidDuration {
                which: "off",
                value: 0.0,
            });
        }
        Ok(Self { on, off })
    }

    /// Validate durations given in seconds; rejects non-positive, NaN and
    /// infinite values.
    pub fn from_secs_f64(on: f64, off: f64) -> Result<Self> {
        let convert = |which: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Duration::try_from_secs_f64(value).map_err(|_| Error::InvalidDuration { which, value })
            } else {
                Err(Error::InvalidDuration { which, value })
            }
        };
        Self::new(convert("on", on)?, convert("off", off)?)
    }

    /// Time the pin stays on.
    pub fn on(&self) -> Duration {
        self.on
    }

    /// Time the pin stays off.
    pub fn off(&self) -> Duration {
        self.off
    }
}

/// Stop request shared between the scheduler and its job thread.
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn raise(&self) {
        *self
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
        self.wake
            .notify_all();
    }

    fn is_raised(&self) -> bool {
        *self
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for `duration` or until raised. Returns `true` when raised.
    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = self
                .wake
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

struct ToggleJob {
    pin: u8,
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Runs at most one toggle job against a shared link.
pub struct ToggleScheduler {
    link: Arc<SerialLink>,
    layout: BoardLayout,
    sink: ToggleSink,
    job: Option<ToggleJob>,
}

impl ToggleScheduler {
    /// Create an idle scheduler.
    pub fn new(link: Arc<SerialLink>, layout: BoardLayout, sink: ToggleSink) -> Self {
        Self {
            link,
            layout,
            sink,
            job: None,
        }
    }

    /// Validate inputs, stop any running job, then start toggling `pin`.
    pub fn start(&mut self, pin: u8, on: Duration, off: Duration) -> Result<()> {
        let pin = self
            .layout
            .validate(pin)?;
        let cycle = DutyCycle::new(on, off)?;
        self.start_cycle(pin, cycle)
    }

    /// Like [`start`](Self::start) with a pre-validated duty cycle.
    pub fn start_cycle(&mut self, pin: u8, cycle: DutyCycle) -> Result<()> {
        let pin = self
            .layout
            .validate(pin)?;
        if !self
            .link
            .is_open()
        {
            return Err(Error::LinkClosed);
        }
        self.stop();

        let signal = Arc::new(StopSignal::default());
        let job_signal = Arc::clone(&signal);
        let link = Arc::clone(&self.link);
        let sink = Arc::clone(&self.sink);
        let handle = thread::Builder::new()
            .name(format!("firmlink-toggle-{pin}"))
            .spawn(move || run_job(&link, &sink, &job_signal, pin, cycle))?;

        info!(
            "Toggling pin {pin}: {:?} on / {:?} off",
            cycle.on(),
            cycle.off()
        );
        self.job = Some(ToggleJob {
            pin,
            signal,
            handle,
        });
        Ok(())
    }

    /// Whether a job is active. A job that ended on a write failure counts
    /// as idle.
    pub fn is_running(&self) -> bool {
        self.job
            .as_ref()
            .is_some_and(|job| {
                !job.handle
                    .is_finished()
            })
    }

    /// Stop the active job and wait for it. No-op when idle.
    ///
    /// Returns within the remaining on/off wait of the job; in practice
    /// immediately, since waits wake on the stop signal.
    pub fn stop(&mut self) {
        if let Some(job) = self
            .job
            .take()
        {
            job.signal
                .raise();
            if job
                .handle
                .join()
                .is_err()
            {
                warn!("Toggle job for pin {} panicked", job.pin);
            }
            debug!("Toggle job for pin {} joined", job.pin);
        }
    }
}

impl Drop for ToggleScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_job(link: &SerialLink, sink: &ToggleSink, signal: &StopSignal, pin: u8, cycle: DutyCycle) {
    let phases = [
        (PinCommand::new(pin, PinState::On), cycle.on()),
        (PinCommand::new(pin, PinState::Off), cycle.off()),
    ];
    'job: loop {
        for (command, hold) in phases {
            if signal.is_raised() {
                break 'job;
            }
            if let Err(e) = link.write_line(&command.encode()) {
                warn!("Toggle job for pin {pin} ended: {e}");
                sink(ToggleEvent::LinkFailure {
                    pin,
                    reason: e.to_string(),
                });
                return;
            }
            sink(ToggleEvent::State {
                pin,
                state: command.state,
            });
            if signal.wait(hold) {
                break 'job;
            }
        }
    }
    sink(ToggleEvent::Stopped { pin });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use std::sync::mpsc;

    fn setup() -> (MockPort, ToggleScheduler, mpsc::Receiver<ToggleEvent>) {
        let device = MockPort::new("MOCK0");
        let link = Arc::new(SerialLink::from_port(Box::new(device.clone())).unwrap());
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sink: ToggleSink = Arc::new(move |event| {
            let _ = tx
                .lock()
                .unwrap()
                .send(event);
        });
        (device, ToggleScheduler::new(link, BoardLayout::uno(), sink), rx)
    }

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_invalid_pin_rejected_without_write() {
        let (device, mut scheduler, _rx) = setup();
        for pin in [0u8, 1, 20, 200] {
            assert!(matches!(
                scheduler.start(pin, MS, MS),
                Err(Error::InvalidPin { .. })
            ));
        }
        assert!(!scheduler.is_running());
        assert!(
            device
                .writes()
                .is_empty()
        );
    }

    #[test]
    fn test_invalid_duration_leaves_idle() {
        let (device, mut scheduler, _rx) = setup();
        assert!(matches!(
            scheduler.start(13, Duration::ZERO, MS),
            Err(Error::InvalidDuration { which: "on", .. })
        ));
        assert!(matches!(
            scheduler.start(13, MS, Duration::ZERO),
            Err(Error::InvalidDuration { which: "off", .. })
        ));
        assert!(!scheduler.is_running());
        assert!(
            device
                .writes()
                .is_empty()
        );
    }

    #[test]
    fn test_from_secs_rejects_non_positive_and_non_finite() {
        for (on, off) in [(0.0, 1.0), (-1.0, 1.0), (1.0, -0.5), (f64::NAN, 1.0), (1.0, f64::INFINITY)] {
            assert!(
                DutyCycle::from_secs_f64(on, off).is_err(),
                "({on}, {off}) should be rejected"
            );
        }
        let cycle = DutyCycle::from_secs_f64(0.5, 1.5).unwrap();
        assert_eq!(cycle.on(), Duration::from_millis(500));
        assert_eq!(cycle.off(), Duration::from_millis(1500));
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (_device, mut scheduler, _rx) = setup();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_job_alternates_on_and_off() {
        let (device, mut scheduler, rx) = setup();
        scheduler
            .start(13, 2 * MS, 2 * MS)
            .unwrap();

        let timeout = Duration::from_secs(2);
        for expected in [PinState::On, PinState::Off, PinState::On, PinState::Off] {
            assert_eq!(
                rx.recv_timeout(timeout).unwrap(),
                ToggleEvent::State {
                    pin: 13,
                    state: expected
                }
            );
        }
        scheduler.stop();
        assert!(!scheduler.is_running());

        let lines = device.written_lines();
        assert!(lines.len() >= 4);
        for (i, line) in lines.iter().enumerate() {
            let expected = if i % 2 == 0 { "13:ON" } else { "13:OFF" };
            assert_eq!(line, expected);
        }
    }

    #[test]
    fn test_stop_interrupts_long_wait() {
        let (_device, mut scheduler, rx) = setup();
        scheduler
            .start(7, Duration::from_secs(30), Duration::from_secs(30))
            .unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ToggleEvent::State { state: PinState::On, .. }
        ));

        let started = Instant::now();
        scheduler.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            ToggleEvent::Stopped { pin: 7 }
        );
    }

    #[test]
    fn test_write_failure_ends_job() {
        let (device, mut scheduler, rx) = setup();
        device.set_fail_writes(true);
        scheduler
            .start(13, MS, MS)
            .unwrap();

        match rx
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
        {
            ToggleEvent::LinkFailure { pin, reason } => {
                assert_eq!(pin, 13);
                assert!(reason.contains("MOCK0"));
            },
            other => panic!("unexpected event {other:?}"),
        }
        // the job thread exits on its own
        let deadline = Instant::now() + Duration::from_secs(2);
        while scheduler.is_running() && Instant::now() < deadline {
            thread::sleep(MS);
        }
        assert!(!scheduler.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_restart_stops_previous_job_first() {
        let (device, mut scheduler, rx) = setup();
        scheduler
            .start(5, Duration::from_secs(30), Duration::from_secs(30))
            .unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ToggleEvent::State { pin: 5, .. }
        ));

        scheduler
            .start(6, 2 * MS, 2 * MS)
            .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ToggleEvent::Stopped { pin: 5 }
        );
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ToggleEvent::State { pin: 6, .. }
        ));
        scheduler.stop();

        let lines = device.written_lines();
        assert_eq!(lines[0], "5:ON");
        assert!(lines[1..].iter().all(|l| l.starts_with("6:")));
    }

    #[test]
    fn test_start_on_closed_link_fails() {
        let (_device, mut scheduler, _rx) = setup();
        scheduler
            .link
            .close();
        assert!(matches!(scheduler.start(13, MS, MS), Err(Error::LinkClosed)));
    }
}
