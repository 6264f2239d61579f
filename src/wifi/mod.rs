mod connectivity;
mod http;
#[cfg(target_os = "espidf")]
mod wifi_driver;

pub use connectivity::*;
pub use http::*;
#[cfg(target_os = "espidf")]
pub use wifi_driver::{EspConnectivity, EspWifiLink};
