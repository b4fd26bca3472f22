//! `paywithterra` is a blocking HTTP client for the PayWithTerra payment API.
//!
//! Every call goes through one request pipeline that retries transport
//! failures, retryable HTTP statuses and undecodable bodies with a linear
//! backoff:
//! - [`PayWithTerraClient::create_order`]
//! - [`PayWithTerraClient::get_order_status_by_uuid`]
//! - [`PayWithTerraClient::is_order_paid_by_uuid`]
//! - [`PayWithTerraClient::add_stream`], [`PayWithTerraClient::list_streams`],
//!   [`PayWithTerraClient::delete_stream`]
//!
//! Webhook callbacks are checked with [`PayWithTerraClient::check_incoming_data`]
//! (or [`callback::verify`] when only the token is at hand).

mod backoff;
pub mod callback;
mod client;
mod error;
mod options;
mod transport;
mod types;

pub use backoff::{backoff_delay, Sleeper, ThreadSleeper};
pub use client::PayWithTerraClient;
pub use error::PayWithTerraError;
pub use options::{ClientOptions, OptionsUpdate, DEFAULT_BASE_URL, DEFAULT_RETRY_STATUSES};
pub use reqwest::Method;
pub use transport::{user_agent, HttpRequest, HttpTransport, RawResponse, Transport, TransportFailure};
pub use types::{ApiRequest, ApiResponse};

pub type Result<T> = std::result::Result<T, PayWithTerraError>;
