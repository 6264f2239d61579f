#[cfg(target_os = "espidf")]
mod esp_adc;
mod sensor_reader;

#[cfg(target_os = "espidf")]
pub use esp_adc::EspAdcFrontEnd;
pub use sensor_reader::*;
