use std::fmt;

const LOG_TARGET: &str = "monitor::main";

/// Factory-programmed hardware address of the board, used as the device id in every
/// report. Resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    bytes: [u8; 6],
    text: String,
}

impl DeviceIdentity {
    /// Creates an identity from a 6 byte MAC address.
    pub fn new(bytes: [u8; 6]) -> Self {
        let text = bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<String>>()
            .join(":");
        DeviceIdentity { bytes, text }
    }

    /// Placeholder used when the address could not be read: all zeros.
    pub fn unknown() -> Self {
        Self::new([0; 6])
    }

    /// Canonical `AA:BB:CC:DD:EE:FF` form.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.bytes
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Reads the default MAC address from eFuse. If the read fails the placeholder
/// identity is returned and a warning is logged, so the caller always gets a value.
#[cfg(target_os = "espidf")]
pub fn read_factory_identity() -> DeviceIdentity {
    use esp_idf_svc::sys::{esp_efuse_mac_get_default, EspError};

    let mut mac = [0u8; 6];
    match EspError::convert(unsafe { esp_efuse_mac_get_default(mac.as_mut_ptr()) }) {
        Ok(()) => {
            let identity = DeviceIdentity::new(mac);
            log::info!(target: LOG_TARGET, "Default eFuse MAC address: {identity}");
            identity
        }
        Err(err) => {
            let identity = DeviceIdentity::unknown();
            log::warn!(target: LOG_TARGET, "Failed to read device MAC ({err}), reporting as {identity}");
            identity
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn read_factory_identity() -> DeviceIdentity {
    log::warn!(target: LOG_TARGET, "No eFuse on this target, reporting as the unknown device");
    DeviceIdentity::unknown()
}
