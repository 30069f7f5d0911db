//! Scripted transports and Web API mocks shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::WebApi;
use crate::config::ConnectorConfig;
use crate::error::TransportError;
use crate::session::Session;
use crate::transport::{Transport, TransportConnector};

#[derive(Default, Clone, Copy)]
enum SendMode {
    #[default]
    Accept,
    Fail,
    Stall,
}

/// Plays back queued receive results, then waits forever.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    inbound: Mutex<VecDeque<Result<String, TransportError>>>,
    sent: Mutex<Vec<String>>,
    sends: SendMode,
    drained: Notify,
}

impl ScriptedTransport {
    pub(crate) fn new(frames: Vec<Result<String, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            inbound: Mutex::new(frames.into()),
            ..Default::default()
        })
    }

    pub(crate) fn failing_sends() -> Arc<Self> {
        Arc::new(Self {
            sends: SendMode::Fail,
            ..Default::default()
        })
    }

    /// Sends never complete, like a half-open socket.
    pub(crate) fn stalled_sends() -> Arc<Self> {
        Arc::new(Self {
            sends: SendMode::Stall,
            ..Default::default()
        })
    }

    /// Resolves once a receive finds the script empty, i.e. every queued
    /// frame has been handed out and handled.
    pub(crate) async fn drained(&self) {
        self.drained.notified().await;
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        match self.sends {
            SendMode::Accept => {
                self.sent.lock().push(frame);
                Ok(())
            }
            SendMode::Fail => Err(TransportError::Closed),
            SendMode::Stall => std::future::pending().await,
        }
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let next = self.inbound.lock().pop_front();
        match next {
            Some(result) => result,
            None => {
                self.drained.notify_one();
                std::future::pending().await
            }
        }
    }
}

/// Hands out queued transports (fresh idle ones once the queue is empty).
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    queued: Mutex<VecDeque<Arc<ScriptedTransport>>>,
    opened: Mutex<Vec<String>>,
    attempts: Mutex<usize>,
    failures: Mutex<usize>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with(transports: Vec<Arc<ScriptedTransport>>) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(transports.into()),
            ..Default::default()
        })
    }

    pub(crate) fn fail_next_open(&self) {
        *self.failures.lock() += 1;
    }

    /// URLs of successfully opened transports.
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub(crate) fn open_attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn open(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        *self.attempts.lock() += 1;
        {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Closed);
            }
        }
        self.opened.lock().push(url.to_string());
        let next = self.queued.lock().pop_front();
        let transport: Arc<dyn Transport> =
            next.unwrap_or_else(|| ScriptedTransport::new(Vec::new()));
        Ok(transport)
    }
}

pub(crate) fn test_config(server: &MockServer) -> ConnectorConfig {
    ConnectorConfig {
        api_base: server.uri(),
        ..ConnectorConfig::with_token("xoxb-test")
    }
}

pub(crate) fn session_with(server: &MockServer, connector: Arc<ScriptedConnector>) -> Arc<Session> {
    let config = test_config(server);
    let api = Arc::new(WebApi::new(&config.api_base, "xoxb-test"));
    Arc::new(Session::new(config, api, connector))
}

pub(crate) async fn mock_rtm_start(server: &MockServer, url: &str) {
    Mock::given(method("POST"))
        .and(path("/rtm.start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "url": url })))
        .mount(server)
        .await;
}

pub(crate) async fn mock_user(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("POST"))
        .and(path("/users.info"))
        .and(body_string_contains(format!("user={id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "user": { "id": id, "name": name },
        })))
        .mount(server)
        .await;
}
