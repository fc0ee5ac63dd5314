//! # Protocol Messages
//!
//! The message kinds exchanged between an embedded component and its owner, the
//! envelope that carries them through an inbox, and the typed payloads.

use crate::component::Props;
use crate::context::{ContextHandle, ContextKind};
use crate::error::ChannelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;

/// The five message kinds of the protocol.
///
/// | Kind | Direction | Shape |
/// |------|-----------|-------|
/// | `Init` | component -> owner, request | reply: [`InitReply`] |
/// | `Props` | owner -> component, one-way | [`PropsUpdate`] |
/// | `Close` | either way, one-way | empty |
/// | `Error` | component -> owner, one-way | [`ErrorReport`] |
/// | `Redirect` | component -> owner, one-way | [`RedirectRequest`] |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "frame_link_init")]
    Init,
    #[serde(rename = "frame_link_props")]
    Props,
    #[serde(rename = "frame_link_close")]
    Close,
    #[serde(rename = "frame_link_error")]
    Error,
    #[serde(rename = "frame_link_redirect")]
    Redirect,
}

impl MessageKind {
    /// Wire name of the message.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Init => "frame_link_init",
            MessageKind::Props => "frame_link_props",
            MessageKind::Close => "frame_link_close",
            MessageKind::Error => "frame_link_error",
            MessageKind::Redirect => "frame_link_redirect",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot channel the receiver answers a request on.
pub type Reply = oneshot::Sender<Result<Value, ChannelError>>;

/// A message sitting in a context's inbox.
///
/// `respond_to` is `Some` for requests and `None` for one-way messages.
#[derive(Debug)]
pub struct Envelope {
    pub source: ContextHandle,
    pub kind: MessageKind,
    pub payload: Value,
    pub respond_to: Option<Reply>,
}

/// What a handler sees: the envelope minus its reply slot.
#[derive(Debug, Clone)]
pub struct Message {
    pub source: ContextHandle,
    pub kind: MessageKind,
    pub payload: Value,
}

impl Message {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Owner's answer to `Init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitReply {
    pub context: ContextKind,
    #[serde(default)]
    pub props: Props,
}

/// Incremental property delta pushed by the owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropsUpdate {
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRequest {
    pub url: String,
}
