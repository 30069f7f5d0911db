//! Keepalive task: sends an RTM `ping` every interval and reconnects when
//! the send fails.

use std::sync::{Arc, Weak};

use serde_json::json;

use crate::error::TransportError;
use crate::session::Session;

/// Runs until the session is dropped or the task is aborted.
pub(crate) async fn run(session: Weak<Session>) {
    let Some(interval) = session
        .upgrade()
        .map(|s| s.config().timings.heartbeat_interval())
    else {
        return;
    };

    loop {
        tokio::time::sleep(interval).await;
        let Some(session) = session.upgrade() else { break };
        beat(&session).await;
    }
}

/// One keepalive: ping the current transport, reconnect on failure unless
/// a reconnect is already running.
pub(crate) async fn beat(session: &Arc<Session>) {
    let id = session.next_frame_id();
    let frame = json!({ "id": id, "type": "ping" }).to_string();

    let (result, epoch) = match session.current() {
        Some((transport, epoch)) => {
            let timeout = session.config().timings.send_timeout();
            let sent = tokio::time::timeout(timeout, transport.send(frame))
                .await
                .unwrap_or(Err(TransportError::Timeout));
            (sent, epoch)
        }
        None => (Err(TransportError::InvalidState), session.epoch()),
    };

    let Err(e) = result else { return };
    tracing::info!(error = %e, "Slack websocket closed, reconnecting...");
    if session.is_reconnecting() {
        tracing::debug!("Reconnect already in progress");
        return;
    }
    if let Err(e) = session.reconnect_from(epoch, None).await {
        tracing::error!(error = %e, "Reconnect after failed keepalive gave up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedConnector, ScriptedTransport, mock_rtm_start, session_with};
    use serde_json::Value;
    use std::time::Duration;
    use wiremock::MockServer;

    #[tokio::test(start_paused = true)]
    async fn pings_carry_increasing_ids() {
        let server = MockServer::start().await;
        mock_rtm_start(&server, "wss://x/test").await;
        let transport = ScriptedTransport::new(Vec::new());
        let session = session_with(&server, ScriptedConnector::with(vec![transport.clone()]));
        session.connect().await.unwrap();

        beat(&session).await;
        beat(&session).await;

        let sent: Vec<Value> = transport
            .sent()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect();
        assert_eq!(sent[0], serde_json::json!({ "id": 1, "type": "ping" }));
        assert_eq!(sent[1], serde_json::json!({ "id": 2, "type": "ping" }));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_on_its_interval() {
        let server = MockServer::start().await;
        mock_rtm_start(&server, "wss://x/test").await;
        let transport = ScriptedTransport::new(Vec::new());
        let session = session_with(&server, ScriptedConnector::with(vec![transport.clone()]));
        session.connect().await.unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(transport.sent().is_empty());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_reconnects_once() {
        let server = MockServer::start().await;
        mock_rtm_start(&server, "wss://x/test").await;
        let connector = ScriptedConnector::with(vec![ScriptedTransport::failing_sends()]);
        let session = session_with(&server, connector.clone());
        session.connect().await.unwrap();
        assert_eq!(connector.open_attempts(), 1);

        beat(&session).await;

        assert_eq!(connector.open_attempts(), 2);
        assert_eq!(session.epoch(), 2);
        assert!(!session.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_send_times_out_and_reconnects_once() {
        let server = MockServer::start().await;
        mock_rtm_start(&server, "wss://x/test").await;
        let connector = ScriptedConnector::with(vec![ScriptedTransport::stalled_sends()]);
        let session = session_with(&server, connector.clone());
        session.connect().await.unwrap();
        let timeout = session.config().timings.send_timeout();

        let started = tokio::time::Instant::now();
        beat(&session).await;

        assert!(started.elapsed() >= timeout);
        assert_eq!(connector.open_attempts(), 2);
        assert_eq!(session.epoch(), 2);
        assert!(!session.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_while_reconnecting_is_skipped() {
        let server = MockServer::start().await;
        mock_rtm_start(&server, "wss://x/test").await;
        let connector = ScriptedConnector::with(vec![ScriptedTransport::failing_sends()]);
        let session = session_with(&server, connector.clone());
        session.connect().await.unwrap();

        session.force_reconnecting(true);
        beat(&session).await;

        assert_eq!(connector.open_attempts(), 1);
        assert_eq!(session.epoch(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_ends_when_session_is_dropped() {
        let server = MockServer::start().await;
        let session = session_with(&server, ScriptedConnector::new());
        let task = tokio::spawn(run(Arc::downgrade(&session)));
        drop(session);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(task.is_finished());
    }
}
