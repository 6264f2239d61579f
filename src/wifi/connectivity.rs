use std::{fmt, net::Ipv4Addr, time::Duration};

use crate::{
    state_channel::{state_channel, StatePublisher, StateWatcher},
    monitor_error::MonitorError,
};

const LOG_TARGET: &str = "monitor::wifi";

/// Connection state of the station interface. There is no terminal state: a lost link
/// always goes back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Asynchronous notifications coming from the platform's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface is up and may associate.
    LinkStarted,
    /// The association was lost or could not be made. Authentication and association
    /// failures are reported this way too.
    LinkLost,
    /// DHCP handed out an address.
    AddressAcquired,
}

/// Error types related to WIFI operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    ConfigurationError,
    ConnectingError(i32),
    NvsAlreadyTaken,
    StartingError(i32),
    SubscriptionError(i32),
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiError::ConfigurationError => write!(f, "the station configuration was rejected"),
            WifiError::ConnectingError(code) => write!(f, "connect request failed (code {code})"),
            WifiError::NvsAlreadyTaken => write!(f, "the default NVS partition was already taken"),
            WifiError::StartingError(code) => write!(f, "could not start the wifi driver (code {code})"),
            WifiError::SubscriptionError(code) => {
                write!(f, "could not subscribe to wifi events (code {code})")
            }
        }
    }
}

impl std::error::Error for WifiError {}

/// The radio as seen by the [`ConnectivityManager`]. Both calls only issue requests;
/// their outcome comes back later as a [`LinkEvent`].
pub trait WifiLink {
    /// Brings the station interface up.
    fn start(&mut self) -> Result<(), WifiError>;

    /// Asks the driver to associate with the configured network.
    fn connect(&mut self) -> Result<(), WifiError>;

    /// Address currently assigned to the interface, if known. Only used for logging.
    fn address(&self) -> Option<Ipv4Addr> {
        None
    }
}

/// Owns the wireless link and drives its state machine from platform events.
///
/// Every transition is published on a state-change channel; the other end, a
/// [`StateWatcher`], is handed out by [`ConnectivityManager::new`]. The manager is the only
/// writer of the connection state.
///
/// Reconnection is unconditional: every lost link triggers an immediate connect attempt,
/// with no backoff and no attempt ceiling.
pub struct ConnectivityManager<L: WifiLink> {
    link: L,
    state: ConnectionState,
    publisher: StatePublisher<ConnectionState>,
    reconnect_attempts: u32,
}

impl<L: WifiLink> ConnectivityManager<L> {
    /// Creates a manager in the `Idle` state, together with the watcher that observes it.
    pub fn new(link: L) -> (Self, StateWatcher<ConnectionState>) {
        let (publisher, watcher) = state_channel(ConnectionState::Idle);
        let manager = ConnectivityManager {
            link,
            state: ConnectionState::Idle,
            publisher,
            reconnect_attempts: 0,
        };
        (manager, watcher)
    }

    /// Brings the interface up. Does nothing unless the manager is `Idle`.
    ///
    /// # Errors
    ///
    /// - `WifiError::StartingError`: If the driver could not be started. The state stays `Idle`.
    pub fn start(&mut self) -> Result<(), WifiError> {
        if self.state != ConnectionState::Idle {
            return Ok(());
        }
        self.link.start()?;
        self.transition(ConnectionState::Connecting);
        log::info!(target: LOG_TARGET, "Wi-Fi initialization completed.");
        Ok(())
    }

    /// Applies one platform event.
    pub fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::LinkStarted => self.request_connect(),
            LinkEvent::LinkLost => {
                self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
                log::info!(
                    target: LOG_TARGET,
                    "Disconnected from Wi-Fi, reconnecting (attempt {})...",
                    self.reconnect_attempts
                );
                self.request_connect();
            }
            LinkEvent::AddressAcquired => {
                match self.link.address() {
                    Some(ip) => log::info!(target: LOG_TARGET, "Got IP: {ip}"),
                    None => log::info!(target: LOG_TARGET, "Got IP"),
                }
                self.reconnect_attempts = 0;
                self.transition(ConnectionState::Connected);
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive link losses since the last acquired address.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// A refused request leaves the manager `Disconnected` until the next event.
    fn request_connect(&mut self) {
        match self.link.connect() {
            Ok(()) => self.transition(ConnectionState::Connecting),
            Err(err) => {
                log::error!(target: LOG_TARGET, "Connect request failed: {err}");
                self.transition(ConnectionState::Disconnected);
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        log::debug!(target: LOG_TARGET, "{:?} -> {:?}", self.state, next);
        self.state = next;
        if self.publisher.publish(next).is_err() {
            log::debug!(target: LOG_TARGET, "No one is watching the connection state");
        }
    }
}

impl StateWatcher<ConnectionState> {
    /// Blocks until the link reaches `Connected` or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - `MonitorError::ConnectTimeout`: If the link did not connect in time.
    pub fn await_connected(&mut self, timeout: Duration) -> Result<(), MonitorError> {
        if self.wait_for(ConnectionState::Connected, timeout) {
            log::info!(target: LOG_TARGET, "Connected to Wi-Fi!");
            Ok(())
        } else {
            log::warn!(target: LOG_TARGET, "Failed to connect to Wi-Fi within {timeout:?}.");
            Err(MonitorError::ConnectTimeout)
        }
    }
}
