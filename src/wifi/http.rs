use std::fmt;

/// Error types related to HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The HTTP client could not be created. Carries the platform error code.
    InizializationError(i32),
    /// Sending the request line, headers or body failed.
    RequestError(i32),
    /// The request was sent but the response could not be read.
    ResponseError(i32),
    SerializationError(String),
    TimeoutError,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::InizializationError(code) => {
                write!(f, "could not create the HTTP client (code {code})")
            }
            NetworkError::RequestError(code) => write!(f, "request failed (code {code})"),
            NetworkError::ResponseError(code) => write!(f, "response failed (code {code})"),
            NetworkError::SerializationError(reason) => {
                write!(f, "could not serialize payload: {reason}")
            }
            NetworkError::TimeoutError => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Header used for HTTP/HTTPS requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    header_type: HttpHeaderType,
    value: String,
}

impl HttpHeader {
    pub fn new(header_type: HttpHeaderType, value: String) -> Self {
        HttpHeader { header_type, value }
    }

    pub fn name(&self) -> &'static str {
        self.header_type.to_str()
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// HTTP headers the reporter sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpHeaderType {
    ContentLength,
    ContentType,
}

impl HttpHeaderType {
    fn to_str(&self) -> &'static str {
        match self {
            HttpHeaderType::ContentLength => "Content-Length",
            HttpHeaderType::ContentType => "Content-Type",
        }
    }
}

/// Checks whether a "Content-Length" header is among `headers`, if not it adds one for
/// a body of `body_len` bytes.
pub fn add_body_len_header(headers: &mut Vec<HttpHeader>, body_len: usize) {
    let has_content_length = headers
        .iter()
        .any(|header| header.header_type == HttpHeaderType::ContentLength);

    if !has_content_length {
        headers.push(HttpHeader::new(HttpHeaderType::ContentLength, body_len.to_string()));
    }
}

/// Blocking HTTP client able to POST a body and report the response status.
pub trait Transport {
    /// Sends one POST request and waits for the response status line.
    ///
    /// # Returns
    ///
    /// The response status code. The response body is not read.
    ///
    /// # Errors
    ///
    /// - `NetworkError::InizializationError`: If the client could not be created.
    /// - `NetworkError::RequestError`: If sending the request failed.
    /// - `NetworkError::ResponseError`: If the response could not be read.
    /// - `NetworkError::TimeoutError`: If the transport gave up waiting.
    fn post(&mut self, uri: &str, headers: &[HttpHeader], body: &[u8]) -> Result<u16, NetworkError>;
}

#[cfg(target_os = "espidf")]
pub use esp::EspHttpTransport;

#[cfg(target_os = "espidf")]
mod esp {
    use std::time::Duration;

    use esp_idf_svc::{
        http::{
            client::{Configuration, EspHttpConnection},
            Method,
        },
        sys::EspError,
    };

    use super::{HttpHeader, NetworkError, Transport};

    /// Error code the HTTP client reports when a socket operation timed out.
    const ESP_ERR_HTTP_EAGAIN: i32 = -0x7007;

    /// ESP-IDF HTTP client. A fresh connection is opened for every request and closed
    /// when it returns, so a failed request never leaves a broken connection behind.
    pub struct EspHttpTransport {
        timeout: Duration,
        https: bool,
    }

    impl EspHttpTransport {
        /// # Arguments
        ///
        /// - `timeout`: Upper bound for each network operation of a request.
        /// - `https`: Attach the certificate bundle to verify the server.
        pub fn new(timeout: Duration, https: bool) -> Self {
            EspHttpTransport { timeout, https }
        }

        fn configuration(&self) -> Configuration {
            if self.https {
                Configuration {
                    timeout: Some(self.timeout),
                    use_global_ca_store: true,
                    crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
                    ..Default::default()
                }
            } else {
                Configuration {
                    timeout: Some(self.timeout),
                    ..Default::default()
                }
            }
        }
    }

    fn map_err(err: EspError, otherwise: fn(i32) -> NetworkError) -> NetworkError {
        match err.code() {
            ESP_ERR_HTTP_EAGAIN => NetworkError::TimeoutError,
            code => otherwise(code),
        }
    }

    impl Transport for EspHttpTransport {
        fn post(&mut self, uri: &str, headers: &[HttpHeader], body: &[u8]) -> Result<u16, NetworkError> {
            let mut connection = EspHttpConnection::new(&self.configuration())
                .map_err(|err| NetworkError::InizializationError(err.code()))?;

            let headers: Vec<(&str, &str)> = headers
                .iter()
                .map(|header| (header.name(), header.value()))
                .collect();
            connection
                .initiate_request(Method::Post, uri, &headers)
                .map_err(|err| map_err(err, NetworkError::RequestError))?;
            let mut written = 0;
            while written < body.len() {
                match connection.write(&body[written..]) {
                    Ok(0) => return Err(NetworkError::RequestError(0)),
                    Ok(len) => written += len,
                    Err(err) => return Err(map_err(err, NetworkError::RequestError)),
                }
            }
            connection
                .initiate_response()
                .map_err(|err| map_err(err, NetworkError::ResponseError))?;
            Ok(connection.status())
        }
    }
}
