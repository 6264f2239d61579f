use std::fmt;

const LOG_TARGET: &str = "monitor::adc";

/// Analog channels of the front end. Both live on ADC1: voltage on channel 6 (GPIO34)
/// and current on channel 7 (GPIO35).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Voltage,
    Current,
}

/// Input attenuation of the ADC channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attenuation {
    Db0,
    Db2_5,
    Db6,
    Db12,
}

/// Conversion widths the ESP32 ADC supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    pub fn bits(&self) -> u8 {
        match self {
            Resolution::Bits9 => 9,
            Resolution::Bits10 => 10,
            Resolution::Bits11 => 11,
            Resolution::Bits12 => 12,
        }
    }

    /// Highest code a conversion can produce.
    pub fn max_code(&self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

/// Fixed digitization settings shared by both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSettings {
    pub resolution: Resolution,
    pub attenuation: Attenuation,
    /// Full-scale input voltage at the configured attenuation, used by the linear fallback.
    pub reference_mv: u32,
}

impl AdcSettings {
    /// Highest code a conversion can produce.
    pub fn max_code(&self) -> u16 {
        self.resolution.max_code()
    }
}

impl Default for AdcSettings {
    fn default() -> Self {
        AdcSettings {
            resolution: Resolution::Bits12,
            attenuation: Attenuation::Db12,
            reference_mv: 3300,
        }
    }
}

/// Outcome of trying to build the vendor calibration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationAvailability {
    /// The curve may be used to convert voltage codes.
    Available,
    /// The chip has no scheme for these settings. Every channel uses the linear fallback.
    Unsupported,
    /// Construction failed. The fallback is used and construction is retried next cycle.
    Failed,
}

/// Error types related to the analog front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The ADC unit or one of its channels could not be set up. Carries the platform code.
    ChannelCreationError(i32),
    /// A raw conversion failed.
    ReadError { channel: SensorChannel, code: i32 },
    /// The calibration curve rejected a code.
    CalibrationError(i32),
    /// `sample` was called before `configure`.
    NotConfigured,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::ChannelCreationError(code) => {
                write!(f, "could not configure the ADC (code {code})")
            }
            SensorError::ReadError { channel, code } => {
                write!(f, "reading the {channel:?} channel failed (code {code})")
            }
            SensorError::CalibrationError(code) => {
                write!(f, "calibrated conversion failed (code {code})")
            }
            SensorError::NotConfigured => write!(f, "ADC channels are not configured"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Hardware side of the sensor pipeline. Implemented on top of the ESP-IDF oneshot ADC
/// driver on the device and by fakes in tests.
pub trait AdcFrontEnd {
    /// Binds both channels with the given settings. Called at most once per reader.
    fn configure_channels(&mut self, settings: &AdcSettings) -> Result<(), SensorError>;

    /// Tries to build the calibration scheme for the given settings.
    fn create_calibration(&mut self, settings: &AdcSettings) -> CalibrationAvailability;

    /// One raw conversion on `channel`.
    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorError>;

    /// Converts a voltage code through the calibration scheme. Only called after
    /// `create_calibration` returned `Available`.
    fn curve_millivolts(&mut self, raw: u16) -> Result<u32, SensorError>;
}

/// Raw codes of one sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub voltage: u16,
    pub current: u16,
}

/// Physical values derived from the [`RawSample`] of the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratedSample {
    pub millivolts: u32,
    pub milliamps: i32,
    pub raw: RawSample,
}

/// Linear model of the current sensor: `(raw - zero_offset) * gain` amps.
///
/// The default gain is `(Vref / 4096) / ((Vsupply / 3.3) * (20 / 1000))`, and the zero
/// offset is the code read with no current flowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentCalibration {
    pub zero_offset: i32,
    pub gain: f64,
}

impl CurrentCalibration {
    pub const DEFAULT_ZERO_OFFSET: i32 = 112;
    pub const DEFAULT_GAIN: f64 = 0.04028320312;

    pub fn new(zero_offset: i32, gain: f64) -> Self {
        CurrentCalibration { zero_offset, gain }
    }

    /// Converts a current code to milliamps, truncating toward zero.
    pub fn milliamps(&self, raw: u16) -> i32 {
        ((raw as i32 - self.zero_offset) as f64 * self.gain * 1000.0) as i32
    }
}

impl Default for CurrentCalibration {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ZERO_OFFSET, Self::DEFAULT_GAIN)
    }
}

/// Owns the analog front end and turns raw codes into millivolts and milliamps.
pub struct SensorReader<A: AdcFrontEnd> {
    front_end: A,
    settings: AdcSettings,
    current: CurrentCalibration,
    configured: bool,
    availability: Option<CalibrationAvailability>,
}

impl<A: AdcFrontEnd> SensorReader<A> {
    pub fn new(front_end: A, settings: AdcSettings, current: CurrentCalibration) -> Self {
        SensorReader {
            front_end,
            settings,
            current,
            configured: false,
            availability: None,
        }
    }

    /// Binds both channels. Repeated calls after a success do nothing.
    ///
    /// # Errors
    ///
    /// - `SensorError::ChannelCreationError`: If the front end refused the settings.
    pub fn configure(&mut self) -> Result<(), SensorError> {
        if self.configured {
            return Ok(());
        }
        self.front_end.configure_channels(&self.settings)?;
        self.configured = true;
        log::info!(
            target: LOG_TARGET,
            "ADC configured: {} bit, {:?} attenuation",
            self.settings.resolution.bits(),
            self.settings.attenuation
        );
        Ok(())
    }

    /// Builds the calibration scheme if it is not known yet.
    ///
    /// `Available` and `Unsupported` are final and returned from cache. After `Failed`
    /// the next call tries again.
    pub fn calibrate(&mut self) -> CalibrationAvailability {
        match self.availability {
            Some(CalibrationAvailability::Failed) | None => {}
            Some(availability) => return availability,
        }
        let availability = self.front_end.create_calibration(&self.settings);
        match availability {
            CalibrationAvailability::Available => {
                log::info!(target: LOG_TARGET, "ADC calibration initialized successfully.")
            }
            CalibrationAvailability::Unsupported => log::warn!(
                target: LOG_TARGET,
                "Calibration scheme not supported, readings use the linear fallback."
            ),
            CalibrationAvailability::Failed => log::warn!(
                target: LOG_TARGET,
                "Failed to initialize ADC calibration, will retry next cycle."
            ),
        }
        self.availability = Some(availability);
        availability
    }

    /// Calibration outcome so far, `None` if `calibrate` was never called.
    pub fn availability(&self) -> Option<CalibrationAvailability> {
        self.availability
    }

    /// Reads the voltage channel, then the current channel.
    ///
    /// # Errors
    ///
    /// - `SensorError::NotConfigured`: If `configure` did not succeed yet.
    /// - `SensorError::ReadError`: If either conversion fails.
    pub fn sample(&mut self) -> Result<RawSample, SensorError> {
        if !self.configured {
            return Err(SensorError::NotConfigured);
        }
        let voltage = self.front_end.read_raw(SensorChannel::Voltage)?;
        log::debug!(target: LOG_TARGET, "Raw voltage ADC value: {voltage}");
        let current = self.front_end.read_raw(SensorChannel::Current)?;
        log::debug!(target: LOG_TARGET, "Raw current ADC value: {current}");
        Ok(RawSample { voltage, current })
    }

    /// Converts a raw sample to physical units.
    ///
    /// The calibration curve is only used when calibration is `Available`; anything else
    /// goes through [`SensorReader::fallback_millivolts`]. Current never depends on the
    /// calibration scheme.
    ///
    /// # Errors
    ///
    /// - `SensorError::CalibrationError`: If the curve rejected the voltage code.
    pub fn convert(&mut self, raw: RawSample) -> Result<CalibratedSample, SensorError> {
        let millivolts = match self.availability {
            Some(CalibrationAvailability::Available) => self.front_end.curve_millivolts(raw.voltage)?,
            _ => self.fallback_millivolts(raw.voltage),
        };
        let milliamps = self.current.milliamps(raw.current);
        log::info!(target: LOG_TARGET, "Voltage: {millivolts} mV, Current: {milliamps} mA");
        Ok(CalibratedSample {
            millivolts,
            milliamps,
            raw,
        })
    }

    /// Linear conversion: `raw * reference_mv / max_code`, truncated.
    pub fn fallback_millivolts(&self, raw: u16) -> u32 {
        let max_code = self.settings.max_code();
        raw.min(max_code) as u32 * self.settings.reference_mv / max_code as u32
    }

    pub fn front_end(&self) -> &A {
        &self.front_end
    }
}
