use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{adc::ADC1, gpio::{Gpio34, Gpio35}, modem::Modem, peripherals::Peripherals},
    nvs::EspDefaultNvsPartition,
};

use crate::{
    config::WifiCredentials,
    monitor_error::MonitorError,
    sensors::{EspAdcFrontEnd, SensorError},
    wifi::{EspWifiLink, WifiError},
};

/// Primary abstraction over the board: takes the peripherals, the system event loop and
/// the default NVS partition once, and hands each one to the driver that needs it.
///
/// - `modem`: Radio, consumed by the wifi link.
/// - `adc`: ADC1 plus the two sensor pins, consumed by the analog front end.
/// - `event_loop`: System event loop, shared with everything that subscribes to events.
/// - `nvs`: Default NVS partition, handed to the wifi driver.
pub struct Microcontroller {
    modem: Option<Modem>,
    adc: Option<(ADC1, Gpio34, Gpio35)>,
    event_loop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
}

impl Microcontroller {
    /// Takes every resource the monitor needs. Fails if any of them is already taken or,
    /// for NVS, if the partition cannot be initialized.
    ///
    /// # Errors
    ///
    /// - `MonitorError::PeripheralError`: If the peripherals were already taken.
    /// - `MonitorError::EventLoopError`: If the system event loop could not be taken.
    /// - `MonitorError::StorageError`: If the NVS partition could not be taken.
    pub fn take() -> Result<Self, MonitorError> {
        let peripherals = Peripherals::take().map_err(|err| MonitorError::PeripheralError(err.code()))?;
        let event_loop = EspSystemEventLoop::take().map_err(|err| MonitorError::EventLoopError(err.code()))?;
        let nvs = EspDefaultNvsPartition::take().map_err(|err| MonitorError::StorageError(err.code()))?;

        Ok(Microcontroller {
            modem: Some(peripherals.modem),
            adc: Some((peripherals.adc1, peripherals.pins.gpio34, peripherals.pins.gpio35)),
            event_loop,
            nvs: Some(nvs),
        })
    }

    pub fn event_loop(&self) -> &EspSystemEventLoop {
        &self.event_loop
    }

    /// Creates the station-mode wifi link. Can only be done once.
    ///
    /// # Errors
    ///
    /// - `WifiError::NvsAlreadyTaken`: If the link was already created.
    /// - Any error from [`EspWifiLink::new`].
    pub fn take_wifi_link(&mut self, credentials: &WifiCredentials) -> Result<EspWifiLink, WifiError> {
        let (modem, nvs) = match (self.modem.take(), self.nvs.take()) {
            (Some(modem), Some(nvs)) => (modem, nvs),
            _ => return Err(WifiError::NvsAlreadyTaken),
        };
        EspWifiLink::new(modem, self.event_loop.clone(), nvs, credentials)
    }

    /// Creates the analog front end on ADC1. Can only be done once.
    ///
    /// # Errors
    ///
    /// - `SensorError::ChannelCreationError`: If the ADC was already taken or its driver
    ///   could not be created.
    pub fn take_adc_front_end(&mut self) -> Result<EspAdcFrontEnd, SensorError> {
        let (adc, voltage_pin, current_pin) = self
            .adc
            .take()
            .ok_or(SensorError::ChannelCreationError(-1))?;
        EspAdcFrontEnd::new(adc, voltage_pin, current_pin)
    }
}
