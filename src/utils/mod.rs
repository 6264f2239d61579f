pub mod monitor_error;
pub mod state_channel;
pub mod timing;
