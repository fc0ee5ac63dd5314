//! # Errors
//!
//! Two error families cover the whole crate:
//!
//! - [`ChannelError`]: the transport could not deliver a message, or the far side
//!   answered a request with an error.
//! - [`ComponentError`]: everything the embedded component reports, from
//!   construction-time topology failures to the close reasons handed to `on_close`.
//!
//! Both are `Clone` so a single handshake outcome can be handed to every caller
//! awaiting [`EmbeddedComponent::init`](crate::component::EmbeddedComponent::init).

use crate::context::ContextId;
use std::any::Any;

/// Errors raised while delivering a message or waiting for its reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Target context {0} is closed")]
    ContextClosed(ContextId),
    #[error("Target dropped the request without replying")]
    NoReply,
    #[error("Context {0} is open but nothing is listening on its inbox")]
    NoListener(ContextId),
    #[error("Remote error: {0}")]
    Remote(String),
    #[error("Malformed payload: {0}")]
    Payload(String),
    #[error("Inbox of context {0} already has a listener")]
    AlreadyListening(ContextId),
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Payload(e.to_string())
    }
}

/// Errors reported by an embedded component.
///
/// The first three variants can only occur during [`attach`](crate::component::EmbeddedComponent::attach).
/// `ContainerClosed` and `OwnerClosed` are never returned from a call: they are passed
/// to the `on_close` callback as the reason the component went away.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComponentError {
    #[error("A component is already attached to context {0}")]
    AlreadyAttached(ContextId),
    #[error("Context {0} has no parent context")]
    NoParentContext(ContextId),
    #[error("Context was not embedded by frame-link: {0}")]
    NotEmbedded(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("[{tag}] handshake failed: {reason}")]
    HandshakeFailed { tag: String, reason: String },
    #[error("[{0}] container context closed")]
    ContainerClosed(String),
    #[error("[{0}] component owner closed")]
    OwnerClosed(String),
    #[error("{callback} callback failed: {reason}")]
    Callback {
        callback: &'static str,
        reason: String,
    },
    #[error("{kind} handler failed: {reason}")]
    HandlerFailed { kind: &'static str, reason: String },
    #[error("Component has no owner to talk to")]
    NotAttached,
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
