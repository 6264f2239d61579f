use std::{
    net::Ipv4Addr,
    sync::{Arc, Mutex},
};

use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent},
};

use super::connectivity::{ConnectionState, ConnectivityManager, LinkEvent, WifiError, WifiLink};
use crate::{
    config::{AuthStrength, WifiCredentials},
    state_channel::StateWatcher,
};

const LOG_TARGET: &str = "monitor::wifi";

/// Station-mode radio on top of `EspWifi`.
pub struct EspWifiLink {
    wifi: EspWifi<'static>,
}

impl EspWifiLink {
    /// Creates the driver and loads the station configuration.
    ///
    /// The default NVS partition is handed to the driver so it can cache calibration
    /// data and speed up future connections to the same network.
    ///
    /// # Errors
    ///
    /// - `WifiError::StartingError`: If the driver could not be created.
    /// - `WifiError::ConfigurationError`: If the credentials do not fit the driver.
    pub fn new(
        modem: Modem,
        event_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        credentials: &WifiCredentials,
    ) -> Result<Self, WifiError> {
        let mut wifi = EspWifi::new(modem, event_loop, Some(nvs))
            .map_err(|err| WifiError::StartingError(err.code()))?;

        // An empty passphrase means an open network, whatever the configured threshold
        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            auth_method_from(credentials.auth)
        };
        let wifi_configuration = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::ConfigurationError)?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::ConfigurationError)?,
            auth_method,
            bssid: None,
            channel: None,
            ..Default::default()
        });
        wifi.set_configuration(&wifi_configuration)
            .map_err(|_| WifiError::ConfigurationError)?;

        Ok(EspWifiLink { wifi })
    }
}

fn auth_method_from(strength: AuthStrength) -> AuthMethod {
    match strength {
        AuthStrength::Open => AuthMethod::None,
        AuthStrength::Wep => AuthMethod::WEP,
        AuthStrength::Wpa => AuthMethod::WPA,
        AuthStrength::Wpa2 => AuthMethod::WPA2Personal,
        AuthStrength::WpaWpa2 => AuthMethod::WPAWPA2Personal,
        AuthStrength::Wpa3 => AuthMethod::WPA3Personal,
        AuthStrength::Wpa2Wpa3 => AuthMethod::WPA2WPA3Personal,
    }
}

impl WifiLink for EspWifiLink {
    fn start(&mut self) -> Result<(), WifiError> {
        self.wifi
            .start()
            .map_err(|err| WifiError::StartingError(err.code()))
    }

    fn connect(&mut self) -> Result<(), WifiError> {
        self.wifi
            .connect()
            .map_err(|err| WifiError::ConnectingError(err.code()))
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }
}

type SharedManager = Arc<Mutex<ConnectivityManager<EspWifiLink>>>;

/// Keeps the connectivity manager subscribed to the system event loop. Wi-Fi and IP
/// events arrive on the event loop task, are translated into [`LinkEvent`]s and applied
/// to the manager under its lock.
///
/// Dropping this unsubscribes both handlers.
pub struct EspConnectivity {
    _manager: SharedManager,
    _wifi_subscription: EspSubscription<'static, System>,
    _ip_subscription: EspSubscription<'static, System>,
}

impl EspConnectivity {
    /// Subscribes to link and address events, then starts the interface.
    ///
    /// # Returns
    ///
    /// The running connectivity and the watcher observing its state.
    ///
    /// # Errors
    ///
    /// - `WifiError::SubscriptionError`: If a handler could not be registered.
    /// - `WifiError::StartingError`: If the interface could not be started.
    pub fn start(
        link: EspWifiLink,
        event_loop: &EspSystemEventLoop,
    ) -> Result<(Self, StateWatcher<ConnectionState>), WifiError> {
        let (manager, watcher) = ConnectivityManager::new(link);
        let manager: SharedManager = Arc::new(Mutex::new(manager));

        let wifi_manager = manager.clone();
        let wifi_subscription = event_loop
            .subscribe::<WifiEvent, _>(move |event| {
                let link_event = match event {
                    WifiEvent::StaStarted => LinkEvent::LinkStarted,
                    WifiEvent::StaDisconnected(_) => LinkEvent::LinkLost,
                    _ => return,
                };
                dispatch(&wifi_manager, link_event);
            })
            .map_err(|err| WifiError::SubscriptionError(err.code()))?;

        let ip_manager = manager.clone();
        let ip_subscription = event_loop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned(_) = event {
                    dispatch(&ip_manager, LinkEvent::AddressAcquired);
                }
            })
            .map_err(|err| WifiError::SubscriptionError(err.code()))?;

        manager
            .lock()
            .map_err(|_| WifiError::StartingError(-1))?
            .start()?;

        Ok((
            EspConnectivity {
                _manager: manager,
                _wifi_subscription: wifi_subscription,
                _ip_subscription: ip_subscription,
            },
            watcher,
        ))
    }
}

fn dispatch(manager: &SharedManager, event: LinkEvent) {
    match manager.lock() {
        Ok(mut manager) => manager.handle_event(event),
        Err(_) => log::error!(target: LOG_TARGET, "Connectivity manager poisoned, dropping {event:?}"),
    }
}
