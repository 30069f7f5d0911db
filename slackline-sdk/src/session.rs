//! The RTM session: handshake, transport ownership and reconnection.
//!
//! One [`Session`] exists per connector and is shared (behind an `Arc`)
//! by the receive loop and the heartbeat task. All state changes go
//! through [`Session::connect`] and [`Session::reconnect`]; nothing else
//! touches the transport slot.
//!
//! ## Reconnection
//!
//! Attempts are serialized by an async mutex. Every installed transport
//! bumps an epoch counter, and a caller reconnecting because *its*
//! transport failed passes the epoch it saw. If another caller has already
//! replaced that transport by the time the lock is acquired, the request
//! returns without touching the network. Installing a transport also
//! wakes anyone still waiting on the old one (see [`Session::replaced`]).
//!
//! Shutdown interrupts pending retry delays, and no heartbeat is started
//! once the session is stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::WebApi;
use crate::config::ConnectorConfig;
use crate::error::Result;
use crate::heartbeat;
use crate::transport::{Transport, TransportConnector};

pub struct Session {
    config: ConnectorConfig,
    api: Arc<WebApi>,
    connector: Arc<dyn TransportConnector>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    endpoint: RwLock<Option<String>>,
    epoch: watch::Sender<u64>,
    reconnect_lock: tokio::sync::Mutex<()>,
    reconnecting: AtomicBool,
    frame_id: AtomicU64,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
}

/// Holds the reconnecting flag up for as long as it lives.
struct ReconnectingGuard<'a>(&'a AtomicBool);

impl<'a> ReconnectingGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ReconnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    pub fn new(
        config: ConnectorConfig,
        api: Arc<WebApi>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        let (epoch, _) = watch::channel(0);
        Self {
            config,
            api,
            connector,
            transport: RwLock::new(None),
            endpoint: RwLock::new(None),
            epoch,
            reconnect_lock: tokio::sync::Mutex::new(()),
            reconnecting: AtomicBool::new(false),
            frame_id: AtomicU64::new(0),
            heartbeat: Mutex::new(None),
            stop,
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<WebApi> {
        &self.api
    }

    /// The installed transport and its epoch, read together.
    ///
    /// Callers use the returned handle for one whole send or receive even
    /// if a reconnect installs a new one meanwhile.
    pub fn current(&self) -> Option<(Arc<dyn Transport>, u64)> {
        let slot = self.transport.read();
        slot.as_ref()
            .map(|t| (t.clone(), *self.epoch.borrow()))
    }

    /// Number of transports installed so far.
    pub fn epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    /// Resolves once the transport of epoch `seen` has been replaced.
    pub async fn replaced(&self, seen: u64) {
        let mut rx = self.epoch.subscribe();
        let _ = rx.wait_for(|epoch| *epoch != seen).await;
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    /// Streaming URL of the current transport.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.read().clone()
    }

    pub(crate) fn next_frame_id(&self) -> u64 {
        self.frame_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Handshake and open the stream.
    ///
    /// Network failures are retried through [`Session::reconnect`]; any
    /// other failure (bad token, unexpected response) is returned.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        match self.handshake().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                let retry = self.config.timings.connect_retry();
                tracing::error!(error = %e, "Failed to connect to Slack, retrying in {}s", retry.as_secs());
                self.reconnect(Some(retry)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the transport, optionally after `delay`.
    pub async fn reconnect(self: &Arc<Self>, delay: Option<Duration>) -> Result<()> {
        self.reconnect_from(self.epoch(), delay).await
    }

    /// Reconnect because the transport of epoch `seen` failed.
    pub(crate) async fn reconnect_from(
        self: &Arc<Self>,
        seen: u64,
        delay: Option<Duration>,
    ) -> Result<()> {
        let _lock = self.reconnect_lock.lock().await;
        if self.epoch() != seen {
            tracing::debug!(seen, epoch = self.epoch(), "Transport already replaced, skipping reconnect");
            return Ok(());
        }

        let _flag = ReconnectingGuard::raise(&self.reconnecting);
        if let Some(delay) = delay {
            if !self.pause(delay).await {
                return Ok(());
            }
        }

        loop {
            if self.is_stopped() {
                tracing::debug!("Session stopped, abandoning reconnect");
                return Ok(());
            }
            match self.handshake().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    let retry = self.config.timings.connect_retry();
                    tracing::error!(error = %e, "Failed to connect to Slack, retrying in {}s", retry.as_secs());
                    if !self.pause(retry).await {
                        return Ok(());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sleep for `delay`. `false` if the session was stopped first.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.stopped() => false,
        }
    }

    async fn handshake(self: &Arc<Self>) -> Result<()> {
        tracing::info!("Connecting to Slack");
        let hs = self.api.rtm_start().await?;
        let transport = self.connector.open(&hs.url).await?;
        self.install(transport, hs.url);

        tracing::debug!(
            bot_name = %self.config.bot_name,
            self_id = hs.self_id.as_deref().unwrap_or("-"),
            "Connected as {}",
            hs.self_name.as_deref().unwrap_or(&self.config.bot_name)
        );
        tracing::debug!("Using icon {}", self.config.icon_emoji);
        tracing::debug!("Default room is {}", self.config.default_room);
        tracing::info!("Connected successfully");

        self.ensure_heartbeat();
        Ok(())
    }

    fn install(&self, transport: Arc<dyn Transport>, url: String) {
        let mut slot = self.transport.write();
        *slot = Some(transport);
        *self.endpoint.write() = Some(url);
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    fn ensure_heartbeat(self: &Arc<Self>) {
        let mut slot = self.heartbeat.lock();
        if self.is_stopped() {
            return;
        }
        if slot.as_ref().is_none_or(|h| h.is_finished()) {
            *slot = Some(tokio::spawn(heartbeat::run(Arc::downgrade(self))));
        }
    }

    /// Stop the heartbeat and wake any receive loop so it can return.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once [`Session::shutdown`] has been called.
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
impl Session {
    pub(crate) fn force_reconnecting(&self, on: bool) {
        self.reconnecting.store(on, Ordering::SeqCst);
    }

    pub(crate) fn has_heartbeat(&self) -> bool {
        self.heartbeat.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}
