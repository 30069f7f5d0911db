//! Inbound event pipeline: receive frames, keep the ones people sent,
//! resolve user references and hand the result to the bot.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::directory::Directory;
use crate::error::{Error, Result, TransportError};
use crate::event::{ChatEvent, NormalizedMessage, RawEvent};
use crate::session::Session;

/// `<@U024BE7LH>` style user references.
static USER_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([A-Z0-9]+)>").expect("user reference pattern"));

/// The bot side of the bridge. Each eligible message is passed in and
/// awaited before the next frame is read, so delivery is in order.
#[async_trait]
pub trait Intake: Send + Sync {
    async fn parse(&self, message: NormalizedMessage) -> anyhow::Result<()>;
}

/// Receive loop. Returns `Ok(())` after shutdown; returns an error for
/// malformed frames and for reconnects that fail fatally.
///
/// A receive pending on a transport that has since been replaced (by a
/// heartbeat reconnect, say) is abandoned and the loop moves to the new one.
pub async fn listen(
    session: &Arc<Session>,
    directory: &Directory,
    connector_name: &str,
    intake: &dyn Intake,
) -> Result<()> {
    loop {
        if session.is_stopped() {
            return Ok(());
        }
        let (transport, epoch) = session
            .current()
            .ok_or(Error::Transport(TransportError::InvalidState))?;

        let received = tokio::select! {
            r = transport.recv() => r,
            _ = session.replaced(epoch) => {
                tracing::debug!(epoch, "Transport replaced, switching over");
                continue;
            }
            _ = session.stopped() => return Ok(()),
        };
        drop(transport);

        let frame = match received {
            Ok(frame) => frame,
            Err(e) => {
                tracing::info!(error = %e, "Slack websocket closed, reconnecting...");
                let delay = session.config().timings.closed_retry();
                session.reconnect_from(epoch, Some(delay)).await?;
                continue;
            }
        };

        let Some(chat) = RawEvent::parse(&frame)?.into_chat() else {
            continue;
        };
        let Some(message) = normalize(directory, connector_name, chat).await else {
            continue;
        };
        if let Err(e) = intake.parse(message).await {
            tracing::warn!(error = %e, "Message handler failed");
        }
    }
}

/// Resolve the sender and user references. `None` drops the event.
pub(crate) async fn normalize(
    directory: &Directory,
    connector_name: &str,
    chat: ChatEvent,
) -> Option<NormalizedMessage> {
    tracing::debug!("Looking up sender username");
    let sender = match directory.resolve(&chat.user).await {
        Ok(user) => user,
        Err(Error::NotARecord(id)) => {
            tracing::debug!(user = %id, "Sender lookup returned no record, dropping message");
            return None;
        }
        Err(e) => {
            tracing::warn!(user = %chat.user, error = %e, "Sender lookup failed, dropping message");
            return None;
        }
    };

    tracing::debug!("Replacing userids in message with usernames");
    let text = replace_user_refs(directory, &chat.text).await;

    Some(NormalizedMessage {
        text,
        user: sender.name.clone(),
        user_id: chat.user,
        room: chat.channel,
        connector: connector_name.to_string(),
    })
}

/// Replace every `<@ID>` whose user resolves with that user's name.
/// References that fail to resolve are left as they are.
pub async fn replace_user_refs(directory: &Directory, text: &str) -> String {
    let mut ids: Vec<&str> = Vec::new();
    for caps in USER_REF.captures_iter(text) {
        let id = caps.get(1).map_or("", |m| m.as_str());
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let mut out = text.to_string();
    for id in ids {
        match directory.resolve(id).await {
            Ok(user) => out = out.replace(&format!("<@{id}>"), &user.name),
            Err(e) => tracing::debug!(user = %id, error = %e, "Leaving unresolved user reference"),
        }
    }
    out
}
