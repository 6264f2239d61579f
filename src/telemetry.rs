use serde::Serialize;

use crate::{
    identity::DeviceIdentity,
    sensors::CalibratedSample,
    wifi::{add_body_len_header, HttpHeader, HttpHeaderType, NetworkError, Transport},
};

const LOG_TARGET: &str = "monitor::http";

/// Body of one report. Field order is the wire order: `mac`, `mv`, `ma`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryPayload {
    pub mac: String,
    pub mv: u32,
    pub ma: i32,
}

impl TelemetryPayload {
    /// Serializes the payload as a compact JSON object.
    ///
    /// # Errors
    ///
    /// - `NetworkError::SerializationError`: If serde_json fails, which for this shape
    ///   only happens on allocation failure.
    pub fn to_json(&self) -> Result<String, NetworkError> {
        serde_json::to_string(self).map_err(|err| NetworkError::SerializationError(err.to_string()))
    }
}

/// Builds the payload for `sample`, reported under `identity`.
pub fn build_payload(identity: &DeviceIdentity, sample: &CalibratedSample) -> TelemetryPayload {
    TelemetryPayload {
        mac: identity.as_str().to_string(),
        mv: sample.millivolts,
        ma: sample.milliamps,
    }
}

/// Posts readings to the collector.
pub struct TelemetryReporter<T: Transport> {
    transport: T,
    endpoint: String,
}

impl<T: Transport> TelemetryReporter<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        TelemetryReporter {
            transport,
            endpoint: endpoint.into(),
        }
    }

    /// POSTs `payload` as JSON to the configured endpoint. Any status code counts as a
    /// delivered report; nothing is retried here.
    ///
    /// # Returns
    ///
    /// The response status code.
    ///
    /// # Errors
    ///
    /// Whatever the transport or the serialization reported, see [`NetworkError`].
    pub fn send(&mut self, payload: &TelemetryPayload) -> Result<u16, NetworkError> {
        let body = payload.to_json()?;
        log::info!(target: LOG_TARGET, "POST: JSON data: {body}");

        let mut headers = vec![HttpHeader::new(
            HttpHeaderType::ContentType,
            "application/json".to_string(),
        )];
        add_body_len_header(&mut headers, body.len());

        match self.transport.post(&self.endpoint, &headers, body.as_bytes()) {
            Ok(status) => {
                log::info!(target: LOG_TARGET, "POST: POST successful, Status = {status}");
                Ok(status)
            }
            Err(err) => {
                log::error!(target: LOG_TARGET, "POST: POST failed: {err}");
                Err(err)
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
