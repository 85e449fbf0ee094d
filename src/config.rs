use std::env;
use std::time::Duration;

use tracing::warn;

use crate::services::mutation_engine::PrecheckPolicy;
use crate::web::notice::DEFAULT_NOTICE_TTL;

#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub notice_ttl: Duration,
    pub precheck: PrecheckPolicy,
    pub host: String,
    pub port: u16,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            notice_ttl: DEFAULT_NOTICE_TTL,
            precheck: PrecheckPolicy::Advisory,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl RosterConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        let precheck = match lookup("ROSTER_LOCAL_PRECHECK") {
            Some(raw) => PrecheckPolicy::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown ROSTER_LOCAL_PRECHECK '{}', using advisory", raw);
                defaults.precheck
            }),
            None => defaults.precheck,
        };

        Self {
            api_url: lookup("ROSTER_API_URL").unwrap_or(defaults.api_url),
            request_timeout: millis("ROSTER_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            notice_ttl: millis("ROSTER_NOTICE_TTL_MS", defaults.notice_ttl),
            precheck,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}
