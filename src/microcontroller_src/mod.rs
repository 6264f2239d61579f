pub mod microcontroller;
pub use self::microcontroller::Microcontroller;
