//! Command handling for the demonstration bot.

use std::sync::Arc;

use async_trait::async_trait;
use slackline_sdk::{Connector, Intake, NormalizedMessage};

pub struct Brain {
    connector: Arc<Connector>,
}

impl Brain {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self { connector }
    }
}

/// What to answer, if anything.
fn answer(msg: &NormalizedMessage) -> Option<String> {
    let text = msg.text.trim();
    let (cmd, rest) = text.split_once(' ').unwrap_or((text, ""));
    match cmd.to_lowercase().as_str() {
        "ping" => Some("pong".to_string()),
        "echo" if !rest.trim().is_empty() => Some(rest.trim().to_string()),
        "hello" | "hi" => Some(format!("Hey {}!", msg.user)),
        _ => None,
    }
}

#[async_trait]
impl Intake for Brain {
    async fn parse(&self, message: NormalizedMessage) -> anyhow::Result<()> {
        let Some(text) = answer(&message) else {
            return Ok(());
        };
        tracing::debug!(room = %message.room, user = %message.user, "Answering");
        self.connector.respond(&message.reply(text)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> NormalizedMessage {
        NormalizedMessage {
            text: text.to_string(),
            user: "alice".to_string(),
            user_id: "U1".to_string(),
            room: "C1".to_string(),
            connector: "slack".to_string(),
        }
    }

    #[test]
    fn ping_pongs() {
        assert_eq!(answer(&msg("ping")).as_deref(), Some("pong"));
        assert_eq!(answer(&msg("  PING  ")).as_deref(), Some("pong"));
    }

    #[test]
    fn echo_repeats_the_rest() {
        assert_eq!(answer(&msg("echo hello there")).as_deref(), Some("hello there"));
        assert_eq!(answer(&msg("echo")), None);
    }

    #[test]
    fn greets_by_resolved_name() {
        assert_eq!(answer(&msg("hi")).as_deref(), Some("Hey alice!"));
    }

    #[test]
    fn ignores_everything_else() {
        assert_eq!(answer(&msg("what's up")), None);
        assert_eq!(answer(&msg("")), None);
    }
}
