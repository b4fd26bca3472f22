/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum PayWithTerraError {
    /// The HTTP exchange could not be completed on any attempt.
    #[error("transport error ({code}) after {attempts} attempt(s): {message}")]
    Transport {
        /// Short classification of the failure (`connect`, `timeout`, ...).
        code: String,
        /// Message text from the underlying transport.
        message: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// The response body was not a JSON object or array on the last attempt.
    #[error("invalid response body (status {status}) after {attempts} attempt(s): {message}")]
    ResponseParse {
        /// HTTP status code of the last response.
        status: u16,
        /// Parser error message.
        message: String,
        /// Raw body of the last response, lossily decoded as UTF-8.
        body: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// Callback `hash` is missing or does not match the recomputed digest.
    #[error("callback signature mismatch")]
    SignatureMismatch,
    /// Request body could not be serialized to JSON.
    #[error("encode error: {0}")]
    Encode(String),
    /// Decoded response does not carry the expected field or type.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid client configuration or call argument.
    #[error("config error: {0}")]
    Config(String),
}
