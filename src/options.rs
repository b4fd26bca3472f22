use std::collections::BTreeSet;

/// Default API root; request paths are appended to it verbatim.
pub const DEFAULT_BASE_URL: &str = "https://paywithterra.com/api/";

/// HTTP status codes retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 9] = [423, 425, 429, 500, 502, 503, 504, 507, 510];

/// Configures the API endpoint and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// API root that request paths are appended to.
    pub base_url: String,
    /// Base retry pause in milliseconds (linear strategy: `pause_ms * attempt`).
    pub pause_ms: u64,
    /// Maximum number of attempts, including the first one. Values below 1
    /// are treated as 1.
    pub max_attempts: u32,
    /// Status codes that trigger another attempt.
    pub retry_statuses: BTreeSet<u16>,
    /// Per-request timeout in milliseconds; `None` keeps the transport default.
    pub timeout_ms: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            pause_ms: 1_000,
            max_attempts: 3,
            retry_statuses: DEFAULT_RETRY_STATUSES.into_iter().collect(),
            timeout_ms: None,
        }
    }
}

impl ClientOptions {
    /// Replaces every field that is set in `update`, keeping the rest.
    pub fn apply(&mut self, update: OptionsUpdate) {
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(pause_ms) = update.pause_ms {
            self.pause_ms = pause_ms;
        }
        if let Some(max_attempts) = update.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(retry_statuses) = update.retry_statuses {
            self.retry_statuses = retry_statuses;
        }
        if let Some(timeout_ms) = update.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
    }

    pub(crate) fn attempt_ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub(crate) fn is_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Partial replacement for [`ClientOptions`]; unset fields are left alone.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OptionsUpdate {
    pub base_url: Option<String>,
    pub pause_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_statuses: Option<BTreeSet<u16>>,
    /// `Some(None)` clears a previously set timeout.
    pub timeout_ms: Option<Option<u64>>,
}
