//! In-memory user directory, filled lazily from `users.info`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::api::WebApi;
use crate::error::{Error, Result};

/// How long a cached user stays valid.
#[derive(Debug, Clone, Copy, Default)]
pub enum CachePolicy {
    /// Entries live for the whole process.
    #[default]
    Forever,
    Ttl(Duration),
}

impl CachePolicy {
    fn is_fresh(&self, fetched_at: Instant) -> bool {
        match self {
            CachePolicy::Forever => true,
            CachePolicy::Ttl(ttl) => fetched_at.elapsed() < *ttl,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    /// Full `user` object as returned by the API.
    pub raw: Map<String, Value>,
}

impl UserRecord {
    /// `None` unless the payload is an object with a string `name`.
    fn from_payload(requested: &str, payload: Value) -> Option<Self> {
        let Value::Object(raw) = payload else { return None };
        let name = raw.get("name")?.as_str()?.to_string();
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(requested)
            .to_string();
        Some(Self { id, name, raw })
    }
}

struct Entry {
    user: Arc<UserRecord>,
    fetched_at: Instant,
}

pub struct Directory {
    api: Arc<WebApi>,
    policy: CachePolicy,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Directory {
    pub fn new(api: Arc<WebApi>, policy: CachePolicy) -> Self {
        Self {
            api,
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached record if fresh, otherwise a `users.info` lookup.
    ///
    /// Two tasks missing on the same id may both hit the API; the later
    /// write wins and both records are equivalent.
    pub async fn resolve(&self, id: &str) -> Result<Arc<UserRecord>> {
        let cached = self
            .entries
            .read()
            .get(id)
            .filter(|e| self.policy.is_fresh(e.fetched_at))
            .map(|e| e.user.clone());
        if let Some(user) = cached {
            return Ok(user);
        }

        tracing::debug!(user = %id, "Looking up user");
        let payload = self.api.users_info(id).await?;
        let user = UserRecord::from_payload(id, payload)
            .map(Arc::new)
            .ok_or_else(|| Error::NotARecord(id.to_string()))?;

        self.entries.write().insert(
            id.to_string(),
            Entry {
                user: user.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(user)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
