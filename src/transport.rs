use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{header::HeaderMap, Method, StatusCode, Version};

/// Fully built outbound request, ready to hand to a [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

/// A completed HTTP exchange, whatever its status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header block as trimmed lines: the status line first, then `name: value`.
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

/// The exchange could not be completed at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportFailure {
    pub code: String,
    pub message: String,
}

impl TransportFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_redirect() {
            "redirect"
        } else if err.is_body() {
            "body"
        } else if err.is_decode() {
            "decode"
        } else if err.is_request() {
            "request"
        } else if err.is_builder() {
            "builder"
        } else {
            "other"
        };
        Self::new(code, err.to_string())
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Executes a single HTTP exchange, synchronously.
///
/// Implementations must not retry on their own; the client owns the retry
/// policy and calls `send` once per attempt.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> std::result::Result<RawResponse, TransportFailure>;
}

/// Default [`Transport`] backed by `reqwest`'s blocking client.
///
/// The blocking client owns a private runtime that must not be created or
/// dropped on an async executor thread, so it is only built on the first
/// `send`. Constructing, cloning and dropping an unused `HttpTransport` is
/// safe anywhere.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: OnceLock<reqwest::blocking::Client>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured client (proxy, TLS roots, connection pool size).
    pub fn from_client(http: reqwest::blocking::Client) -> Self {
        Self {
            http: OnceLock::from(http),
        }
    }

    #[cfg(test)]
    fn is_initialized(&self) -> bool {
        self.http.get().is_some()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> std::result::Result<RawResponse, TransportFailure> {
        let mut builder = self
            .http
            .get_or_init(reqwest::blocking::Client::new)
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(TransportFailure::from_reqwest)?;
        let status = response.status();
        let headers = header_lines(response.version(), status, response.headers());
        let body = response
            .bytes()
            .map_err(TransportFailure::from_reqwest)?
            .to_vec();

        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Value sent as `User-Agent` on every request.
pub fn user_agent() -> String {
    format!("paywithterra-rust/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn header_lines(
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(headers.len() + 1);
    lines.push(format!("{version:?} {status}").trim().to_owned());
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        lines.push(format!("{name}: {value}").trim().to_owned());
    }
    lines
}

#[cfg(test)]
mod tests {
    use reqwest::{
        header::{HeaderMap, HeaderValue, CONTENT_TYPE},
        StatusCode, Version,
    };

    use super::{header_lines, user_agent, HttpTransport, TransportFailure};

    #[test]
    fn new_transport_defers_building_the_client() {
        let transport = HttpTransport::new();
        let copy = transport.clone();
        assert!(!transport.is_initialized());
        assert!(!copy.is_initialized());
    }

    #[test]
    fn header_lines_start_with_status_line() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static(" abc "));

        let lines = header_lines(Version::HTTP_11, StatusCode::TOO_MANY_REQUESTS, &headers);

        assert_eq!(lines[0], "HTTP/1.1 429 Too Many Requests");
        assert!(lines.contains(&"content-type: application/json".to_owned()));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn user_agent_names_library_and_version() {
        let agent = user_agent();
        assert!(agent.starts_with("paywithterra-rust/"));
        assert!(agent.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn failure_display_includes_code() {
        let failure = TransportFailure::new("connect", "connection refused");
        assert_eq!(failure.to_string(), "connect: connection refused");
    }
}
