//! Power monitor firmware. Joins the configured network, samples the voltage and current
//! sensors every few seconds and POSTs the readings to the collector.

#[cfg(target_os = "espidf")]
fn main() -> Result<(), monitor_esp32::monitor_error::MonitorError> {
    use monitor_esp32::{
        config::MonitorConfig,
        identity::read_factory_identity,
        scheduler::{MonitorContext, NoRetryFixedCadence, ReportingScheduler, SchedulerOptions},
        sensors::{AdcSettings, CurrentCalibration, SensorReader},
        telemetry::TelemetryReporter,
        timing::FreeRtosSleeper,
        wifi::{EspConnectivity, EspHttpTransport},
        Microcontroller,
    };

    const LOG_TARGET: &str = "monitor::main";

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = MonitorConfig::from_build_config().map_err(|err| {
        log::error!(target: LOG_TARGET, "{err}");
        err
    })?;
    let mut micro = Microcontroller::take()?;
    let identity = read_factory_identity();

    let link = micro.take_wifi_link(&config.wifi)?;
    let (_connectivity, watcher) = EspConnectivity::start(link, micro.event_loop())?;

    let mut reader = SensorReader::new(
        micro.take_adc_front_end()?,
        AdcSettings::default(),
        CurrentCalibration::new(config.current_zero_offset, config.current_gain),
    );
    reader.configure()?;
    reader.calibrate();

    let transport = EspHttpTransport::new(config.http_timeout, config.endpoint.starts_with("https://"));
    let context = MonitorContext {
        identity,
        reader,
        reporter: TelemetryReporter::new(transport, config.endpoint.clone()),
        connectivity: watcher,
    };
    let scheduler = ReportingScheduler::new(
        context,
        NoRetryFixedCadence::new(config.report_interval),
        FreeRtosSleeper,
        SchedulerOptions {
            connect_timeout: config.connect_timeout,
            gate_on_connectivity: config.gate_on_connectivity,
        },
    );
    scheduler.run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("monitor-esp32 only runs on ESP-IDF targets, build with --target xtensa-esp32-espidf");
}
