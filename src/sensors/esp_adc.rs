use std::rc::Rc;

use esp_idf_svc::{
    hal::{
        adc::{
            attenuation,
            oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
            Resolution as HalResolution, ADC1,
        },
        gpio::{Gpio34, Gpio35},
    },
    sys::{
        adc_atten_t, adc_bitwidth_t, adc_bitwidth_t_ADC_BITWIDTH_10, adc_bitwidth_t_ADC_BITWIDTH_11,
        adc_bitwidth_t_ADC_BITWIDTH_12, adc_bitwidth_t_ADC_BITWIDTH_9, adc_cali_create_scheme_line_fitting,
        adc_cali_delete_scheme_line_fitting, adc_cali_handle_t, adc_cali_line_fitting_config_t,
        adc_cali_raw_to_voltage, adc_unit_t_ADC_UNIT_1, EspError, ESP_ERR_INVALID_STATE,
        ESP_ERR_NOT_SUPPORTED,
    },
};

use super::sensor_reader::{
    AdcFrontEnd, AdcSettings, Attenuation, CalibrationAvailability, Resolution, SensorChannel,
    SensorError,
};

const LOG_TARGET: &str = "monitor::adc";

type SharableAdcDriver = Rc<AdcDriver<'static, ADC1>>;

/// ADC1 oneshot front end with the voltage sensor on GPIO34 (channel 6) and the current
/// sensor on GPIO35 (channel 7). Calibration uses the line fitting scheme, the one the
/// ESP32 provides.
pub struct EspAdcFrontEnd {
    adc_driver: SharableAdcDriver,
    pins: Option<(Gpio34, Gpio35)>,
    voltage: Option<AdcChannelDriver<'static, Gpio34, SharableAdcDriver>>,
    current: Option<AdcChannelDriver<'static, Gpio35, SharableAdcDriver>>,
    calibration: Option<adc_cali_handle_t>,
}

impl EspAdcFrontEnd {
    /// Creates the front end, taking ownership of ADC1 and both sensor pins.
    ///
    /// # Errors
    ///
    /// - `SensorError::ChannelCreationError`: If the ADC unit could not be created.
    pub fn new(adc: ADC1, voltage_pin: Gpio34, current_pin: Gpio35) -> Result<Self, SensorError> {
        let adc_driver = AdcDriver::new(adc).map_err(|err| SensorError::ChannelCreationError(err.code()))?;
        Ok(EspAdcFrontEnd {
            adc_driver: Rc::new(adc_driver),
            pins: Some((voltage_pin, current_pin)),
            voltage: None,
            current: None,
            calibration: None,
        })
    }
}

fn atten_from(attenuation: Attenuation) -> adc_atten_t {
    match attenuation {
        Attenuation::Db0 => attenuation::NONE,
        Attenuation::Db2_5 => attenuation::DB_2_5,
        Attenuation::Db6 => attenuation::DB_6,
        // Named DB_11 by older IDF releases, same hardware setting
        Attenuation::Db12 => attenuation::DB_11,
    }
}

fn hal_resolution_from(resolution: Resolution) -> HalResolution {
    match resolution {
        Resolution::Bits9 => HalResolution::Resolution9Bit,
        Resolution::Bits10 => HalResolution::Resolution10Bit,
        Resolution::Bits11 => HalResolution::Resolution11Bit,
        Resolution::Bits12 => HalResolution::Resolution12Bit,
    }
}

fn bitwidth_from(resolution: Resolution) -> adc_bitwidth_t {
    match resolution {
        Resolution::Bits9 => adc_bitwidth_t_ADC_BITWIDTH_9,
        Resolution::Bits10 => adc_bitwidth_t_ADC_BITWIDTH_10,
        Resolution::Bits11 => adc_bitwidth_t_ADC_BITWIDTH_11,
        Resolution::Bits12 => adc_bitwidth_t_ADC_BITWIDTH_12,
    }
}

impl AdcFrontEnd for EspAdcFrontEnd {
    fn configure_channels(&mut self, settings: &AdcSettings) -> Result<(), SensorError> {
        // Channel drivers consume the pins, so a failed bind cannot be retried
        let Some((voltage_pin, current_pin)) = self.pins.take() else {
            return match (&self.voltage, &self.current) {
                (Some(_), Some(_)) => Ok(()),
                _ => Err(SensorError::ChannelCreationError(ESP_ERR_INVALID_STATE)),
            };
        };
        let mut config = AdcChannelConfig::new();
        config.attenuation = atten_from(settings.attenuation);
        config.resolution = hal_resolution_from(settings.resolution);
        config.calibration = false;

        let voltage = AdcChannelDriver::new(self.adc_driver.clone(), voltage_pin, &config)
            .map_err(|err| SensorError::ChannelCreationError(err.code()))?;
        let current = AdcChannelDriver::new(self.adc_driver.clone(), current_pin, &config)
            .map_err(|err| SensorError::ChannelCreationError(err.code()))?;
        self.voltage = Some(voltage);
        self.current = Some(current);
        Ok(())
    }

    fn create_calibration(&mut self, settings: &AdcSettings) -> CalibrationAvailability {
        if self.calibration.is_some() {
            return CalibrationAvailability::Available;
        }
        let config = adc_cali_line_fitting_config_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            atten: atten_from(settings.attenuation),
            bitwidth: bitwidth_from(settings.resolution),
            ..Default::default()
        };
        let mut handle: adc_cali_handle_t = std::ptr::null_mut();
        match EspError::convert(unsafe { adc_cali_create_scheme_line_fitting(&config, &mut handle) }) {
            Ok(()) => {
                self.calibration = Some(handle);
                CalibrationAvailability::Available
            }
            Err(err) if err.code() == ESP_ERR_NOT_SUPPORTED => CalibrationAvailability::Unsupported,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "Line fitting scheme creation failed: {err}");
                CalibrationAvailability::Failed
            }
        }
    }

    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorError> {
        let read = match channel {
            SensorChannel::Voltage => self.voltage.as_mut().map(|driver| driver.read_raw()),
            SensorChannel::Current => self.current.as_mut().map(|driver| driver.read_raw()),
        };
        match read {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(err)) => Err(SensorError::ReadError {
                channel,
                code: err.code(),
            }),
            None => Err(SensorError::NotConfigured),
        }
    }

    fn curve_millivolts(&mut self, raw: u16) -> Result<u32, SensorError> {
        let handle = self
            .calibration
            .ok_or(SensorError::CalibrationError(ESP_ERR_NOT_SUPPORTED))?;
        let mut millivolts: i32 = 0;
        EspError::convert(unsafe { adc_cali_raw_to_voltage(handle, raw as i32, &mut millivolts) })
            .map_err(|err| SensorError::CalibrationError(err.code()))?;
        Ok(millivolts.max(0) as u32)
    }
}

impl Drop for EspAdcFrontEnd {
    fn drop(&mut self) {
        if let Some(handle) = self.calibration.take() {
            unsafe { adc_cali_delete_scheme_line_fitting(handle) };
        }
    }
}
