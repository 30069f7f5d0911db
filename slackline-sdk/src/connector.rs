//! Public entry point tying the session, directory and pipeline together.

use std::sync::Arc;

use crate::api::{PostMessage, WebApi};
use crate::config::ConnectorConfig;
use crate::directory::Directory;
use crate::error::Result;
use crate::event::Reply;
use crate::pipeline::{self, Intake};
use crate::session::Session;
use crate::transport::{TransportConnector, WsConnector};

/// Name stamped on every message this connector produces.
pub const CONNECTOR_NAME: &str = "slack";

/// A Slack RTM connector.
///
/// ```no_run
/// # async fn demo(bot: &dyn slackline_sdk::Intake) -> slackline_sdk::Result<()> {
/// use slackline_sdk::{Connector, ConnectorConfig};
///
/// let connector = Connector::new(ConnectorConfig::with_token("xoxb-..."))?;
/// connector.connect().await?;
/// connector.listen(bot).await
/// # }
/// ```
pub struct Connector {
    session: Arc<Session>,
    directory: Directory,
}

impl Connector {
    /// Build a connector that talks WebSocket. Fails if no token is configured.
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WsConnector))
    }

    pub fn with_transport(
        config: ConnectorConfig,
        transport: Arc<dyn TransportConnector>,
    ) -> Result<Self> {
        tracing::debug!("Starting Slack connector");
        let api = Arc::new(WebApi::new(&config.api_base, config.token()?));
        let directory = Directory::new(api.clone(), config.cache_policy());
        Ok(Self {
            session: Arc::new(Session::new(config, api, transport)),
            directory,
        })
    }

    pub fn name(&self) -> &'static str {
        CONNECTOR_NAME
    }

    pub fn config(&self) -> &ConnectorConfig {
        self.session.config()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Handshake and open the stream; starts the keepalive task.
    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await
    }

    /// Feed inbound messages to `intake` until shutdown or a fatal error.
    pub async fn listen(&self, intake: &dyn Intake) -> Result<()> {
        pipeline::listen(&self.session, &self.directory, CONNECTOR_NAME, intake).await
    }

    /// Post a reply under the configured bot name and icon. Not retried.
    pub async fn respond(&self, reply: &Reply) -> Result<()> {
        tracing::debug!(room = %reply.room, "Responding with: '{}'", reply.text);
        let config = self.session.config();
        self.session
            .api()
            .post_message(&PostMessage {
                channel: &reply.room,
                text: &reply.text,
                as_user: false,
                username: &config.bot_name,
                icon_emoji: &config.icon_emoji,
                attachments: reply.attachments.as_ref(),
            })
            .await
    }

    /// Post to the default room.
    pub async fn say(&self, text: &str) -> Result<()> {
        let reply = Reply::new(&self.session.config().default_room, text);
        self.respond(&reply).await
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
