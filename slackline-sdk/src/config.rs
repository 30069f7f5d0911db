//! Static connector configuration.
//!
//! Read once at construction, usually from a TOML file:
//!
//! ```toml
//! api-token = "xoxb-..."
//! default-room = "#general"
//! icon-emoji = ":robot_face:"
//! bot-name = "opsdroid"
//!
//! [timings]
//! heartbeat-interval-secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::CachePolicy;
use crate::error::{Error, Result};

pub const DEFAULT_ROOM: &str = "#general";
pub const DEFAULT_ICON: &str = ":robot_face:";
pub const DEFAULT_BOT_NAME: &str = "opsdroid";
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectorConfig {
    /// Bot token. Required; the connector refuses to start without it.
    pub api_token: Option<String>,
    /// Where `Connector::say` posts.
    pub default_room: String,
    pub icon_emoji: String,
    /// Name replies are posted under.
    pub bot_name: String,
    /// Web API root, overridable for tests and proxies.
    pub api_base: String,
    /// Expire cached users after this many seconds. Absent = never.
    pub cache_ttl_secs: Option<u64>,
    pub timings: Timings,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            default_room: DEFAULT_ROOM.to_string(),
            icon_emoji: DEFAULT_ICON.to_string(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            cache_ttl_secs: None,
            timings: Timings::default(),
        }
    }
}

impl ConnectorConfig {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            api_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("can't read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// The token, or the fatal startup error when it is missing.
    pub fn token(&self) -> Result<&str> {
        match self.api_token.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(Error::MissingConfig("api-token")),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self.cache_ttl_secs {
            Some(secs) => CachePolicy::Ttl(Duration::from_secs(secs)),
            None => CachePolicy::Forever,
        }
    }
}

/// Delays and periods used by the session tasks, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Timings {
    pub heartbeat_interval_secs: u64,
    pub send_timeout_secs: u64,
    /// Wait before reconnecting after the socket closes.
    pub closed_retry_secs: u64,
    /// Wait before retrying a handshake that failed at the network level.
    pub connect_retry_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 60,
            send_timeout_secs: 10,
            closed_retry_secs: 5,
            connect_retry_secs: 10,
        }
    }
}

impl Timings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn closed_retry(&self) -> Duration {
        Duration::from_secs(self.closed_retry_secs)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }
}
