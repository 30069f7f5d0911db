//! Slack Web API client.
//!
//! Only the three methods the connector needs: `rtm.start` (handshake),
//! `users.info` (directory lookups) and `chat.postMessage` (replies).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// What the handshake hands back.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// WebSocket endpoint for this RTM session.
    pub url: String,
    pub self_id: Option<String>,
    pub self_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RtmStartBody {
    url: Option<String>,
    #[serde(rename = "self")]
    me: Option<SelfInfo>,
}

#[derive(Debug, Deserialize)]
struct SelfInfo {
    id: Option<String>,
    name: Option<String>,
}

/// A `chat.postMessage` request body.
#[derive(Debug, Clone, Serialize)]
pub struct PostMessage<'a> {
    pub channel: &'a str,
    pub text: &'a str,
    pub as_user: bool,
    pub username: &'a str,
    pub icon_emoji: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<&'a Value>,
}

pub struct WebApi {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl WebApi {
    pub fn new(base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Start an RTM session and return its streaming endpoint.
    pub async fn rtm_start(&self) -> Result<Handshake> {
        let body = self.call("rtm.start", self.post("rtm.start")).await?;
        let body: RtmStartBody = serde_json::from_value(body).map_err(|e| Error::Api {
            method: "rtm.start",
            error: format!("unexpected response: {e}"),
        })?;
        let url = body.url.filter(|u| !u.is_empty()).ok_or(Error::MissingUrl)?;
        let (self_id, self_name) = match body.me {
            Some(me) => (me.id, me.name),
            None => (None, None),
        };
        Ok(Handshake { url, self_id, self_name })
    }

    /// Raw `user` payload for an id. Whatever shape the service returned,
    /// `Value::Null` when the field is absent.
    pub async fn users_info(&self, user: &str) -> Result<Value> {
        let req = self.post("users.info").form(&[("user", user)]);
        let mut body = self.call("users.info", req).await?;
        Ok(body.get_mut("user").map(Value::take).unwrap_or(Value::Null))
    }

    pub async fn post_message(&self, msg: &PostMessage<'_>) -> Result<()> {
        let req = self.post("chat.postMessage").json(msg);
        self.call("chat.postMessage", req).await?;
        Ok(())
    }

    fn post(&self, method: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{method}", self.base))
            .bearer_auth(&self.token)
    }

    async fn call(&self, method: &'static str, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = req
            .send()
            .await
            .map_err(|source| Error::Http { method, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status { method, status });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|source| Error::Http { method, source })?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(Error::Api { method, error });
        }
        Ok(body)
    }
}
