use std::fmt;

use crate::{
    config::ConfigError,
    sensors::SensorError,
    wifi::{NetworkError, WifiError},
};

/// Aggregate of every error the monitor can surface. Drivers return their own error
/// type and `?` lifts them into this one at the bootstrap and scheduler level.
#[derive(Debug)]
pub enum MonitorError {
    ConfigError(ConfigError),
    /// The link did not reach `Connected` within the configured wait.
    ConnectTimeout,
    /// The system event loop could not be taken. Carries the platform error code.
    EventLoopError(i32),
    NetworkError(NetworkError),
    /// The chip peripherals were already taken. Carries the platform error code.
    PeripheralError(i32),
    SensorError(SensorError),
    /// Persistent storage could not be initialized. Carries the platform error code.
    StorageError(i32),
    WifiError(WifiError),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::ConfigError(err) => write!(f, "invalid configuration: {err}"),
            MonitorError::ConnectTimeout => write!(f, "timed out waiting for the wifi link"),
            MonitorError::EventLoopError(code) => {
                write!(f, "could not take the system event loop (code {code})")
            }
            MonitorError::NetworkError(err) => write!(f, "network error: {err}"),
            MonitorError::PeripheralError(code) => {
                write!(f, "could not take the peripherals (code {code})")
            }
            MonitorError::SensorError(err) => write!(f, "sensor error: {err}"),
            MonitorError::StorageError(code) => {
                write!(f, "could not initialize persistent storage (code {code})")
            }
            MonitorError::WifiError(err) => write!(f, "wifi error: {err}"),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<ConfigError> for MonitorError {
    fn from(value: ConfigError) -> Self {
        MonitorError::ConfigError(value)
    }
}

impl From<NetworkError> for MonitorError {
    fn from(value: NetworkError) -> Self {
        MonitorError::NetworkError(value)
    }
}

impl From<SensorError> for MonitorError {
    fn from(value: SensorError) -> Self {
        MonitorError::SensorError(value)
    }
}

impl From<WifiError> for MonitorError {
    fn from(value: WifiError) -> Self {
        MonitorError::WifiError(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_startup_faults_are_told_apart() {
        let messages = [
            MonitorError::PeripheralError(259).to_string(),
            MonitorError::EventLoopError(259).to_string(),
            MonitorError::StorageError(259).to_string(),
        ];
        assert!(messages[0].contains("peripherals"));
        assert!(messages[1].contains("event loop"));
        assert!(messages[2].contains("persistent storage"));
    }

    #[test]
    fn test1_component_errors_convert_with_question_mark() {
        fn configure() -> Result<(), MonitorError> {
            let bound: Result<(), SensorError> = Err(SensorError::NotConfigured);
            bound?;
            Ok(())
        }
        assert!(matches!(
            configure(),
            Err(MonitorError::SensorError(SensorError::NotConfigured))
        ));
    }
}
