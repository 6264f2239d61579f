mod utils;
#[cfg(target_os = "espidf")]
mod microcontroller_src;

pub mod config;
pub mod identity;
pub mod scheduler;
pub mod sensors;
pub mod telemetry;
pub mod wifi;

#[cfg(target_os = "espidf")]
pub use microcontroller_src::Microcontroller;
pub use utils::{monitor_error, state_channel, timing};
