//! slackline-sdk: a Slack RTM connector for bot pipelines.
//!
//! Keeps one authenticated WebSocket session alive (handshake, keepalive,
//! reconnection), turns inbound `message` events into [`event::NormalizedMessage`]s
//! for an external [`pipeline::Intake`], and posts replies back through the
//! Web API.

pub mod api;
pub mod config;
pub mod connector;
pub mod directory;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod pipeline;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConnectorConfig, Timings};
pub use connector::Connector;
pub use error::{Error, Result, TransportError};
pub use event::{NormalizedMessage, Reply};
pub use pipeline::Intake;
