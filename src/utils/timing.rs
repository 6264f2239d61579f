use std::time::Duration;

/// Something able to block the calling task for a while. The reporting loop sleeps
/// through this so tests can run it against a virtual clock.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps through a FreeRTOS task delay, in milliseconds.
#[cfg(target_os = "espidf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRtosSleeper;

#[cfg(target_os = "espidf")]
impl Sleeper for FreeRtosSleeper {
    fn sleep(&mut self, duration: Duration) {
        let miliseconds = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(miliseconds)
    }
}
