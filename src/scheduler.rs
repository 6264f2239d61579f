//! The reporting loop: sample, convert, report, sleep, forever.
//!
//! Every step of a cycle runs on the calling task, one after the other, so a report is
//! never in flight while the next sample is taken. The effective period is the cadence
//! interval plus however long the network call took.

use std::time::{Duration, Instant};

use crate::{
    identity::DeviceIdentity,
    monitor_error::MonitorError,
    sensors::{AdcFrontEnd, CalibrationAvailability, SensorReader},
    state_channel::StateWatcher,
    telemetry::{build_payload, TelemetryReporter},
    timing::Sleeper,
    wifi::{ConnectionState, NetworkError, Transport},
};

const LOG_TARGET: &str = "monitor::main";

/// What happened during one reporting cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The collector answered with this status code.
    Reported { status: u16 },
    /// The POST failed. The next cycle is the retry.
    NetworkFailed(NetworkError),
    /// The link was not connected, the report was not attempted.
    SkippedOffline,
    /// Sampling or conversion failed, the cycle was abandoned.
    SensorFault,
}

/// Decides how long to wait before the next cycle.
pub trait CadencePolicy {
    fn next_delay(&mut self, outcome: &CycleOutcome) -> Duration;
}

/// Same interval after every cycle, whatever happened. A failed report is not retried
/// early; the next regular cycle is the only retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoRetryFixedCadence {
    interval: Duration,
}

impl NoRetryFixedCadence {
    pub fn new(interval: Duration) -> Self {
        NoRetryFixedCadence { interval }
    }
}

impl Default for NoRetryFixedCadence {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl CadencePolicy for NoRetryFixedCadence {
    fn next_delay(&mut self, _outcome: &CycleOutcome) -> Duration {
        self.interval
    }
}

/// Everything a cycle needs, owned in one place.
pub struct MonitorContext<A: AdcFrontEnd, T: Transport> {
    pub identity: DeviceIdentity,
    pub reader: SensorReader<A>,
    pub reporter: TelemetryReporter<T>,
    pub connectivity: StateWatcher<ConnectionState>,
}

/// Knobs of the loop that are not part of any component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// How long to wait for the first connection before running degraded.
    pub connect_timeout: Duration,
    /// Skip the POST of cycles that start while the link is down.
    pub gate_on_connectivity: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            connect_timeout: Duration::from_secs(30),
            gate_on_connectivity: true,
        }
    }
}

pub struct ReportingScheduler<A, T, P, S>
where
    A: AdcFrontEnd,
    T: Transport,
    P: CadencePolicy,
    S: Sleeper,
{
    context: MonitorContext<A, T>,
    policy: P,
    sleeper: S,
    options: SchedulerOptions,
}

impl<A, T, P, S> ReportingScheduler<A, T, P, S>
where
    A: AdcFrontEnd,
    T: Transport,
    P: CadencePolicy,
    S: Sleeper,
{
    pub fn new(context: MonitorContext<A, T>, policy: P, sleeper: S, options: SchedulerOptions) -> Self {
        ReportingScheduler {
            context,
            policy,
            sleeper,
            options,
        }
    }

    /// Waits once for the link, bounded by `connect_timeout`.
    ///
    /// # Errors
    ///
    /// - `MonitorError::ConnectTimeout`: If the link is still down after the timeout.
    pub fn wait_for_link(&mut self) -> Result<(), MonitorError> {
        self.context
            .connectivity
            .await_connected(self.options.connect_timeout)
    }

    /// Runs one cycle: retry calibration if needed, sample, convert, and report unless
    /// the link is down and gating is on. Does not sleep.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let context = &mut self.context;
        if matches!(
            context.reader.availability(),
            None | Some(CalibrationAvailability::Failed)
        ) {
            context.reader.calibrate();
        }

        log::info!(target: LOG_TARGET, "Reading ADC values...");
        let calibrated = match context
            .reader
            .sample()
            .and_then(|raw| context.reader.convert(raw))
        {
            Ok(calibrated) => calibrated,
            Err(err) => {
                log::error!(target: LOG_TARGET, "Abandoning cycle: {err}");
                return CycleOutcome::SensorFault;
            }
        };

        let state = context.connectivity.current();
        if self.options.gate_on_connectivity && state != ConnectionState::Connected {
            log::warn!(target: LOG_TARGET, "Link is {state:?}, skipping report");
            return CycleOutcome::SkippedOffline;
        }

        let payload = build_payload(&context.identity, &calibrated);
        log::info!(target: LOG_TARGET, "Sending POST request...");
        match context.reporter.send(&payload) {
            Ok(status) => CycleOutcome::Reported { status },
            Err(err) => CycleOutcome::NetworkFailed(err),
        }
    }

    /// Runs one cycle, then sleeps for whatever the cadence policy says.
    pub fn step(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let outcome = self.run_cycle();
        let delay = self.policy.next_delay(&outcome);
        log::debug!(
            target: LOG_TARGET,
            "Cycle finished in {:?} with {outcome:?}, next in {delay:?}",
            started.elapsed()
        );
        self.sleeper.sleep(delay);
        outcome
    }

    /// Waits for the first connection, then loops forever. A connection timeout is
    /// logged and the loop starts anyway; reports resume once the link comes up.
    pub fn run(mut self) -> ! {
        if let Err(err) = self.wait_for_link() {
            log::warn!(target: LOG_TARGET, "{err}, reporting starts in degraded mode");
        }
        loop {
            self.step();
        }
    }
}
