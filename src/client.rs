use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::{
    backoff::{backoff_delay, Sleeper, ThreadSleeper},
    callback,
    transport::{user_agent, HttpRequest, HttpTransport, RawResponse, Transport},
    ApiRequest, ApiResponse, ClientOptions, OptionsUpdate, PayWithTerraError, Result,
};

#[derive(Clone)]
/// Blocking HTTP client for the PayWithTerra API.
pub struct PayWithTerraClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    token: String,
    options: ClientOptions,
}

impl fmt::Debug for PayWithTerraClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayWithTerraClient")
            .field("token", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

enum Attempt {
    Done(ApiResponse),
    Retry(&'static str),
}

impl PayWithTerraClient {
    /// Creates a client for the given API token with default options.
    ///
    /// No HTTP client is built until the first request, so a client that is
    /// only used for [`PayWithTerraClient::check_incoming_data`] can live and
    /// be dropped inside an async webhook handler.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            sleeper: Arc::new(ThreadSleeper),
            token: token.into(),
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `PAYWITHTERRA_TOKEN` — API token (required)
    /// - `PAYWITHTERRA_BASE_URL` — API root (optional, defaults to
    ///   [`crate::DEFAULT_BASE_URL`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// use paywithterra::PayWithTerraClient;
    ///
    /// let client = PayWithTerraClient::from_env().expect("missing PAYWITHTERRA_TOKEN");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let token = std::env::var("PAYWITHTERRA_TOKEN")
            .map_err(|_| "missing PAYWITHTERRA_TOKEN environment variable".to_owned())?;
        if token.trim().is_empty() {
            return Err("PAYWITHTERRA_TOKEN is set but empty".to_owned());
        }

        let mut client = Self::new(token.trim());
        if let Ok(base_url) = std::env::var("PAYWITHTERRA_BASE_URL") {
            if base_url.trim().is_empty() {
                return Err("PAYWITHTERRA_BASE_URL is set but empty".to_owned());
            }
            client.options.base_url = base_url.trim().to_owned();
        }
        Ok(client)
    }

    /// Replaces all client options.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the HTTP transport, e.g. with a preconfigured `reqwest` client.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Replaces the function used to wait between attempts.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Replaces the options present in `update`, keeping the others.
    pub fn reconfigure(&mut self, update: OptionsUpdate) {
        self.options.apply(update);
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Creates a payment order. Check [`ApiResponse::status`] for `200`
    /// before trusting the returned order.
    pub fn create_order<T: Serialize + ?Sized>(&self, fields: &T) -> Result<ApiResponse> {
        self.execute(ApiRequest::post("order", encode_body(fields)?))
    }

    /// Fetches the current state of an order.
    pub fn get_order_status_by_uuid(&self, uuid: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::get(order_path(uuid)?))
    }

    /// Returns the `is_payed` flag of an order.
    ///
    /// A missing or non-boolean `is_payed` field is reported as
    /// [`PayWithTerraError::Decode`]; it is never treated as "not paid".
    pub fn is_order_paid_by_uuid(&self, uuid: &str) -> Result<bool> {
        let response = self.get_order_status_by_uuid(uuid)?;
        match response.body.get("is_payed") {
            Some(JsonValue::Bool(paid)) => Ok(*paid),
            Some(other) => Err(PayWithTerraError::Decode(format!(
                "order {uuid}: `is_payed` is not a boolean: {other}"
            ))),
            None => Err(PayWithTerraError::Decode(format!(
                "order {uuid}: response has no `is_payed` field (status {})",
                response.status
            ))),
        }
    }

    /// Registers a new stream.
    pub fn add_stream<T: Serialize + ?Sized>(&self, fields: &T) -> Result<ApiResponse> {
        self.execute(ApiRequest::post("stream", encode_body(fields)?))
    }

    /// Lists the streams registered for this token.
    pub fn list_streams(&self) -> Result<ApiResponse> {
        self.execute(ApiRequest::get("streams"))
    }

    /// Deletes the stream with the given id.
    pub fn delete_stream(&self, id: u64) -> Result<ApiResponse> {
        self.execute(ApiRequest::post("stream/delete", json!({ "id": id })))
    }

    /// Verifies a webhook callback signed with this client's token.
    ///
    /// See [`callback::verify`].
    pub fn check_incoming_data<I, K, V>(&self, payload: I) -> Result<BTreeMap<String, String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        callback::verify(&self.token, payload)
    }

    /// Sends a request, retrying transport failures, retryable statuses and
    /// undecodable bodies up to `max_attempts` times in total.
    ///
    /// A response whose status is still retryable on the last attempt is
    /// returned like any other response when its body decodes.
    pub fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let ceiling = self.options.attempt_ceiling();
        let http_request = self.build_request(&request)?;
        let mut attempt = 1u32;
        loop {
            match self.attempt_once(&http_request, attempt, ceiling)? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(reason) => {
                    self.wait_before_retry(attempt, reason);
                    attempt += 1;
                }
            }
        }
    }

    fn attempt_once(&self, request: &HttpRequest, attempt: u32, ceiling: u32) -> Result<Attempt> {
        let raw = match self.transport.send(request.clone()) {
            Ok(raw) => raw,
            Err(failure) => {
                if attempt >= ceiling {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempt,
                        code = %failure.code,
                        "transport failure, giving up"
                    );
                    return Err(PayWithTerraError::Transport {
                        code: failure.code,
                        message: failure.message,
                        attempts: attempt,
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %failure, "transport failure");
                return Ok(Attempt::Retry("transport failure"));
            }
        };

        if attempt < ceiling && self.options.is_retry_status(raw.status) {
            return Ok(Attempt::Retry("retryable status"));
        }

        match decode_body(&raw.body) {
            Ok(body) => Ok(Attempt::Done(ApiResponse {
                status: raw.status,
                headers: raw.headers,
                body,
                attempts: attempt,
            })),
            Err(message) => {
                if attempt >= ceiling {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempt,
                        status = raw.status,
                        "undecodable response body, giving up"
                    );
                    return Err(parse_error(raw, message, attempt));
                }
                Ok(Attempt::Retry("undecodable body"))
            }
        }
    }

    fn build_request(&self, request: &ApiRequest) -> Result<HttpRequest> {
        let mut headers = HeaderMap::new();
        let authorization =
            HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
                PayWithTerraError::Config("token is not a valid header value".to_owned())
            })?;
        headers.insert(header::AUTHORIZATION, authorization);
        let agent = HeaderValue::from_str(&user_agent())
            .map_err(|err| PayWithTerraError::Config(format!("invalid user agent: {err}")))?;
        headers.insert(header::USER_AGENT, agent);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let body = match &request.body {
            Some(body) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                let encoded = serde_json::to_vec(body)
                    .map_err(|err| PayWithTerraError::Encode(err.to_string()))?;
                Some(encoded)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: request.method.clone(),
            url: format!("{}{}", self.options.base_url, request.path),
            headers,
            body,
            timeout: self.options.timeout_ms.map(Duration::from_millis),
        })
    }

    /// Waits `pause_ms * attempt` before the next attempt.
    fn wait_before_retry(&self, attempt: u32, _reason: &str) {
        let delay = backoff_delay(self.options.pause_ms, attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt,
            reason = _reason,
            "retrying request after {} ms",
            delay.as_millis()
        );

        self.sleeper.sleep(delay);
    }
}

fn encode_body<T: Serialize + ?Sized>(fields: &T) -> Result<JsonValue> {
    serde_json::to_value(fields).map_err(|err| PayWithTerraError::Encode(err.to_string()))
}

/// Builds `order/{uuid}`. The uuid is used as a single path segment, so only
/// ASCII letters, digits, `-` and `_` are accepted.
fn order_path(uuid: &str) -> Result<String> {
    if uuid.is_empty() {
        return Err(PayWithTerraError::Config(
            "order uuid must not be empty".to_owned(),
        ));
    }
    if let Some(bad) = uuid
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(PayWithTerraError::Config(format!(
            "order uuid contains invalid character {bad:?}"
        )));
    }
    Ok(format!("order/{uuid}"))
}

fn decode_body(body: &[u8]) -> std::result::Result<JsonValue, String> {
    let value: JsonValue = serde_json::from_slice(body).map_err(|err| err.to_string())?;
    match value {
        JsonValue::Object(_) | JsonValue::Array(_) => Ok(value),
        other => Err(format!("expected a JSON object or array, got `{other}`")),
    }
}

fn parse_error(raw: RawResponse, message: String, attempts: u32) -> PayWithTerraError {
    PayWithTerraError::ResponseParse {
        status: raw.status,
        message,
        body: String::from_utf8_lossy(&raw.body).into_owned(),
        attempts,
    }
}
