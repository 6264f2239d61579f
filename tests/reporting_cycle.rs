use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use monitor_esp32::{
    identity::DeviceIdentity,
    monitor_error::MonitorError,
    scheduler::{CycleOutcome, MonitorContext, NoRetryFixedCadence, ReportingScheduler, SchedulerOptions},
    sensors::{
        AdcFrontEnd, AdcSettings, CalibrationAvailability, CurrentCalibration, SensorChannel,
        SensorError, SensorReader,
    },
    telemetry::TelemetryReporter,
    timing::Sleeper,
    wifi::{ConnectionState, ConnectivityManager, HttpHeader, LinkEvent, NetworkError, Transport, WifiError, WifiLink},
};

/// Shared virtual time, advanced only by the fakes.
#[derive(Clone, Default)]
struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by)
    }
}

struct FakeAdc {
    clock: VirtualClock,
    voltage_reads: Rc<RefCell<Vec<Duration>>>,
    calibrations: Vec<CalibrationAvailability>,
    calibration_calls: Rc<Cell<usize>>,
    curve_calls: Rc<Cell<usize>>,
    fail_reads: bool,
    fail_curve: bool,
}

impl AdcFrontEnd for FakeAdc {
    fn configure_channels(&mut self, _settings: &AdcSettings) -> Result<(), SensorError> {
        Ok(())
    }

    fn create_calibration(&mut self, _settings: &AdcSettings) -> CalibrationAvailability {
        let calls = self.calibration_calls.get();
        self.calibration_calls.set(calls + 1);
        self.calibrations[calls.min(self.calibrations.len() - 1)]
    }

    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorError> {
        if self.fail_reads {
            return Err(SensorError::ReadError { channel, code: -1 });
        }
        match channel {
            SensorChannel::Voltage => {
                self.voltage_reads.borrow_mut().push(self.clock.now());
                Ok(4095)
            }
            SensorChannel::Current => Ok(112),
        }
    }

    fn curve_millivolts(&mut self, raw: u16) -> Result<u32, SensorError> {
        self.curve_calls.set(self.curve_calls.get() + 1);
        if self.fail_curve {
            return Err(SensorError::CalibrationError(-1));
        }
        Ok(raw as u32)
    }
}

struct SlowTransport {
    clock: VirtualClock,
    latency: Duration,
    post_starts: Rc<RefCell<Vec<Duration>>>,
    bodies: Rc<RefCell<Vec<String>>>,
    fail: bool,
}

impl Transport for SlowTransport {
    fn post(&mut self, _uri: &str, _headers: &[HttpHeader], body: &[u8]) -> Result<u16, NetworkError> {
        self.post_starts.borrow_mut().push(self.clock.now());
        self.bodies
            .borrow_mut()
            .push(String::from_utf8_lossy(body).into_owned());
        self.clock.advance(self.latency);
        if self.fail {
            Err(NetworkError::TimeoutError)
        } else {
            Ok(200)
        }
    }
}

struct VirtualSleeper {
    clock: VirtualClock,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl Sleeper for VirtualSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.clock.advance(duration);
    }
}

struct IdleLink;

impl WifiLink for IdleLink {
    fn start(&mut self) -> Result<(), WifiError> {
        Ok(())
    }

    fn connect(&mut self) -> Result<(), WifiError> {
        Ok(())
    }
}

struct TestBench {
    voltage_reads: Rc<RefCell<Vec<Duration>>>,
    post_starts: Rc<RefCell<Vec<Duration>>>,
    bodies: Rc<RefCell<Vec<String>>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
    calibration_calls: Rc<Cell<usize>>,
    curve_calls: Rc<Cell<usize>>,
    manager: ConnectivityManager<IdleLink>,
    scheduler: ReportingScheduler<FakeAdc, SlowTransport, NoRetryFixedCadence, VirtualSleeper>,
}

struct BenchOptions {
    connected: bool,
    gate_on_connectivity: bool,
    fail_reads: bool,
    fail_curve: bool,
    fail_posts: bool,
    calibrations: Vec<CalibrationAvailability>,
}

impl Default for BenchOptions {
    fn default() -> Self {
        BenchOptions {
            connected: true,
            gate_on_connectivity: true,
            fail_reads: false,
            fail_curve: false,
            fail_posts: false,
            calibrations: vec![CalibrationAvailability::Available],
        }
    }
}

fn initialize_test(options: BenchOptions) -> TestBench {
    let clock = VirtualClock::default();
    let voltage_reads = Rc::new(RefCell::new(Vec::new()));
    let post_starts = Rc::new(RefCell::new(Vec::new()));
    let bodies = Rc::new(RefCell::new(Vec::new()));
    let sleeps = Rc::new(RefCell::new(Vec::new()));
    let calibration_calls = Rc::new(Cell::new(0));
    let curve_calls = Rc::new(Cell::new(0));

    let (mut manager, connectivity) = ConnectivityManager::new(IdleLink);
    manager.start().unwrap();
    manager.handle_event(LinkEvent::LinkStarted);
    if options.connected {
        manager.handle_event(LinkEvent::AddressAcquired);
    }

    let adc = FakeAdc {
        clock: clock.clone(),
        voltage_reads: voltage_reads.clone(),
        calibrations: options.calibrations,
        calibration_calls: calibration_calls.clone(),
        curve_calls: curve_calls.clone(),
        fail_reads: options.fail_reads,
        fail_curve: options.fail_curve,
    };
    let mut reader = SensorReader::new(adc, AdcSettings::default(), CurrentCalibration::default());
    reader.configure().unwrap();

    let transport = SlowTransport {
        clock: clock.clone(),
        latency: Duration::from_secs(5),
        post_starts: post_starts.clone(),
        bodies: bodies.clone(),
        fail: options.fail_posts,
    };
    let context = MonitorContext {
        identity: DeviceIdentity::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
        reader,
        reporter: TelemetryReporter::new(transport, "http://collector/api/readings"),
        connectivity,
    };
    let sleeper = VirtualSleeper {
        clock,
        sleeps: sleeps.clone(),
    };
    let scheduler = ReportingScheduler::new(
        context,
        NoRetryFixedCadence::new(Duration::from_secs(10)),
        sleeper,
        SchedulerOptions {
            connect_timeout: Duration::from_millis(20),
            gate_on_connectivity: options.gate_on_connectivity,
        },
    );

    TestBench {
        voltage_reads,
        post_starts,
        bodies,
        sleeps,
        calibration_calls,
        curve_calls,
        manager,
        scheduler,
    }
}

#[test]
fn test0_slow_post_never_overlaps_next_sample() {
    let mut bench = initialize_test(BenchOptions::default());
    assert_eq!(bench.scheduler.step(), CycleOutcome::Reported { status: 200 });
    assert_eq!(bench.scheduler.step(), CycleOutcome::Reported { status: 200 });

    let voltage_reads = bench.voltage_reads.borrow();
    let post_starts = bench.post_starts.borrow();
    assert_eq!(voltage_reads.len(), 2);
    assert!(voltage_reads[1] >= post_starts[0] + Duration::from_secs(5));
    // cadence is interval plus network latency
    assert_eq!(voltage_reads[1] - voltage_reads[0], Duration::from_secs(15));
}

#[test]
fn test1_report_body_carries_converted_sample() {
    let mut bench = initialize_test(BenchOptions::default());
    bench.scheduler.step();
    assert_eq!(
        bench.bodies.borrow()[0],
        r#"{"mac":"AA:BB:CC:DD:EE:FF","mv":4095,"ma":0}"#
    );
}

#[test]
fn test2_offline_cycle_skips_report_but_keeps_cadence() {
    let mut bench = initialize_test(BenchOptions {
        connected: false,
        ..Default::default()
    });
    assert_eq!(bench.scheduler.step(), CycleOutcome::SkippedOffline);
    assert!(bench.post_starts.borrow().is_empty());
    assert_eq!(bench.voltage_reads.borrow().len(), 1);
    assert_eq!(*bench.sleeps.borrow(), vec![Duration::from_secs(10)]);

    bench.manager.handle_event(LinkEvent::AddressAcquired);
    assert_eq!(bench.manager.state(), ConnectionState::Connected);
    assert_eq!(bench.scheduler.step(), CycleOutcome::Reported { status: 200 });
}

#[test]
fn test3_ungated_cycle_reports_while_offline() {
    let mut bench = initialize_test(BenchOptions {
        connected: false,
        gate_on_connectivity: false,
        ..Default::default()
    });
    assert_eq!(bench.scheduler.step(), CycleOutcome::Reported { status: 200 });
    assert_eq!(bench.post_starts.borrow().len(), 1);
}

#[test]
fn test4_sensor_fault_abandons_cycle_and_still_sleeps() {
    let mut bench = initialize_test(BenchOptions {
        fail_reads: true,
        ..Default::default()
    });
    assert_eq!(bench.scheduler.step(), CycleOutcome::SensorFault);
    assert!(bench.post_starts.borrow().is_empty());
    assert_eq!(*bench.sleeps.borrow(), vec![Duration::from_secs(10)]);
}

#[test]
fn test5_failed_post_is_only_retried_by_next_cycle() {
    let mut bench = initialize_test(BenchOptions {
        fail_posts: true,
        ..Default::default()
    });
    assert_eq!(
        bench.scheduler.step(),
        CycleOutcome::NetworkFailed(NetworkError::TimeoutError)
    );
    assert_eq!(bench.post_starts.borrow().len(), 1);
    assert_eq!(*bench.sleeps.borrow(), vec![Duration::from_secs(10)]);

    bench.scheduler.step();
    assert_eq!(bench.post_starts.borrow().len(), 2);
}

#[test]
fn test6_failed_calibration_is_retried_each_cycle() {
    let mut bench = initialize_test(BenchOptions {
        calibrations: vec![
            CalibrationAvailability::Failed,
            CalibrationAvailability::Failed,
            CalibrationAvailability::Available,
        ],
        ..Default::default()
    });
    bench.scheduler.step();
    bench.scheduler.step();
    assert_eq!(bench.curve_calls.get(), 0);
    bench.scheduler.step();
    bench.scheduler.step();
    assert_eq!(bench.calibration_calls.get(), 3);
    assert_eq!(bench.curve_calls.get(), 2);
}

#[test]
fn test7_unsupported_calibration_uses_fallback_for_every_cycle() {
    let mut bench = initialize_test(BenchOptions {
        calibrations: vec![CalibrationAvailability::Unsupported],
        ..Default::default()
    });
    bench.scheduler.step();
    bench.scheduler.step();
    assert_eq!(bench.calibration_calls.get(), 1);
    assert_eq!(bench.curve_calls.get(), 0);
    assert!(bench.bodies.borrow()[1].contains(r#""mv":3300"#));
}

#[test]
fn test8_initial_wait_is_bounded() {
    let mut bench = initialize_test(BenchOptions {
        connected: false,
        ..Default::default()
    });
    assert!(matches!(
        bench.scheduler.wait_for_link(),
        Err(MonitorError::ConnectTimeout)
    ));

    let mut bench = initialize_test(BenchOptions::default());
    assert!(bench.scheduler.wait_for_link().is_ok());
}

#[test]
fn test9_failing_curve_abandons_cycle_and_still_sleeps() {
    let mut bench = initialize_test(BenchOptions {
        fail_curve: true,
        ..Default::default()
    });
    assert_eq!(bench.scheduler.step(), CycleOutcome::SensorFault);
    assert_eq!(bench.curve_calls.get(), 1);
    assert!(bench.post_starts.borrow().is_empty());
    assert_eq!(*bench.sleeps.borrow(), vec![Duration::from_secs(10)]);
}
