//! # Mock Peer
//!
//! Utilities for testing a component without writing a real container.
//!
//! [`MockPeer`] takes over the inbox of a context (usually the container or owner) and
//! plays the other side of the protocol:
//!
//! - requests are answered from a queue of expectations set up front
//!   (`expect_request(kind).return_ok(..)` / `.return_err(..)`),
//! - every inbound message is recorded so tests can assert on it,
//! - [`post`](MockPeer::post) and [`request`](MockPeer::request) push messages the other way.
//!
//! ```rust
//! use frame_link::channel::mock::{init_reply, MockPeer};
//! use frame_link::channel::{Channel, MailboxTransport, MessageKind};
//! use frame_link::context::{ContextHandle, ContextKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let top = ContextHandle::top_level("top");
//!     let frame = top.open_frame("frame");
//!
//!     let mut owner = MockPeer::new(&top);
//!     owner
//!         .expect_request(MessageKind::Init)
//!         .return_ok(init_reply(ContextKind::Iframe, Default::default()));
//!
//!     let channel = Channel::new(frame.clone(), Arc::new(MailboxTransport));
//!     let reply = channel.send(&top, MessageKind::Init, ()).await.unwrap();
//!     assert_eq!(reply["context"], "iframe");
//!     owner.verify();
//! }
//! ```
//!
//! For full manual control, take the inbox yourself and use [`expect_message`].

use crate::channel::core::{MailboxTransport, Transport};
use crate::channel::message::{Envelope, InitReply, MessageKind};
use crate::component::Props;
use crate::context::{ContextHandle, ContextKind};
use crate::error::ChannelError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

struct Expectation {
    kind: MessageKind,
    response: Result<Value, ChannelError>,
}

/// A message the peer received.
#[derive(Debug, Clone)]
pub struct Received {
    pub source: ContextHandle,
    pub kind: MessageKind,
    pub payload: Value,
    pub expects_reply: bool,
}

/// Scripted stand-in for the container side of the protocol.
pub struct MockPeer {
    context: ContextHandle,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    received: Arc<Mutex<Vec<Received>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
    arrived: Arc<Notify>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockPeer {
    /// Takes over the inbox of `context`.
    ///
    /// # Panics
    /// If the inbox already has a listener.
    pub fn new(context: &ContextHandle) -> Self {
        let mut inbox = context
            .take_inbox()
            .expect("MockPeer needs an inbox nobody listens on");
        let expectations: Arc<Mutex<VecDeque<Expectation>>> = Arc::default();
        let received: Arc<Mutex<Vec<Received>>> = Arc::default();
        let mismatches: Arc<Mutex<Vec<String>>> = Arc::default();
        let arrived = Arc::new(Notify::new());

        let handle = {
            let expectations = expectations.clone();
            let received = received.clone();
            let mismatches = mismatches.clone();
            let arrived = arrived.clone();
            tokio::spawn(async move {
                while let Some(envelope) = inbox.recv().await {
                    received.lock().push(Received {
                        source: envelope.source.clone(),
                        kind: envelope.kind,
                        payload: envelope.payload.clone(),
                        expects_reply: envelope.respond_to.is_some(),
                    });

                    if let Some(respond_to) = envelope.respond_to {
                        let expectation = expectations.lock().pop_front();
                        let response = match expectation {
                            Some(expectation) if expectation.kind == envelope.kind => {
                                expectation.response
                            }
                            other => {
                                let expected = other.map(|e| e.kind.as_str()).unwrap_or("nothing");
                                mismatches.lock().push(format!(
                                    "got {} request, expected {expected}",
                                    envelope.kind
                                ));
                                Err(ChannelError::Remote("unexpected request".to_string()))
                            }
                        };
                        let _ = respond_to.send(response);
                    }

                    arrived.notify_waiters();
                }
            })
        };

        Self {
            context: context.clone(),
            expectations,
            received,
            mismatches,
            arrived,
            _handle: handle,
        }
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    /// Queues the answer for the next request, which must be of `kind`.
    pub fn expect_request(&mut self, kind: MessageKind) -> RequestExpectationBuilder {
        RequestExpectationBuilder {
            kind,
            expectations: self.expectations.clone(),
        }
    }

    /// Everything received so far, in arrival order.
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }

    pub fn received_of(&self, kind: MessageKind) -> Vec<Received> {
        self.received
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Waits until at least `count` messages of `kind` have arrived and returns them.
    pub async fn wait_for(&self, kind: MessageKind, count: usize) -> Vec<Received> {
        loop {
            let notified = self.arrived.notified();
            let matching = self.received_of(kind);
            if matching.len() >= count {
                return matching;
            }
            notified.await;
        }
    }

    /// Sends a request from this peer's context.
    pub async fn request(
        &self,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<Value, ChannelError> {
        MailboxTransport
            .request(&self.context, target, kind, payload)
            .await
    }

    /// Posts a one-way message from this peer's context.
    pub fn post(
        &self,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<(), ChannelError> {
        MailboxTransport.post(&self.context, target, kind, payload)
    }

    /// Panics if expectations are left over or a request did not match.
    pub fn verify(&self) {
        let mismatches = self.mismatches.lock();
        if !mismatches.is_empty() {
            panic!("Unexpected requests: {mismatches:?}");
        }
        let remaining = self.expectations.lock().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

/// Builder for request expectations.
pub struct RequestExpectationBuilder {
    kind: MessageKind,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl RequestExpectationBuilder {
    pub fn return_ok(self, reply: Value) {
        self.expectations.lock().push_back(Expectation {
            kind: self.kind,
            response: Ok(reply),
        });
    }

    pub fn return_err(self, error: ChannelError) {
        self.expectations.lock().push_back(Expectation {
            kind: self.kind,
            response: Err(error),
        });
    }
}

/// Builds the JSON an owner sends back for `Init`.
pub fn init_reply(context: ContextKind, props: Props) -> Value {
    serde_json::to_value(InitReply { context, props }).unwrap_or(Value::Null)
}

/// Takes the next envelope from `inbox` if it is of `kind`.
pub async fn expect_message(
    inbox: &mut mpsc::UnboundedReceiver<Envelope>,
    kind: MessageKind,
) -> Option<Envelope> {
    match inbox.recv().await {
        Some(envelope) if envelope.kind == kind => Some(envelope),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use serde_json::json;

    #[tokio::test]
    async fn answers_requests_from_expectations() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let mut peer = MockPeer::new(&top);
        peer.expect_request(MessageKind::Init)
            .return_ok(init_reply(ContextKind::Popup, Props::new()));
        peer.expect_request(MessageKind::Init)
            .return_err(ChannelError::Remote("denied".into()));

        let channel = Channel::new(frame.clone(), Arc::new(MailboxTransport));
        let first = channel.send(&top, MessageKind::Init, ()).await.unwrap();
        assert_eq!(first, json!({ "context": "popup", "props": {} }));
        let second = channel.send(&top, MessageKind::Init, ()).await;
        assert_eq!(second, Err(ChannelError::Remote("denied".into())));

        peer.verify();
        let received = peer.received();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|r| r.source == frame && r.expects_reply));
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected requests")]
    async fn verify_flags_unexpected_requests() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let peer = MockPeer::new(&top);

        let channel = Channel::new(frame, Arc::new(MailboxTransport));
        let result = channel.send(&top, MessageKind::Init, ()).await;
        assert!(result.is_err());
        peer.verify();
    }

    #[tokio::test]
    async fn manual_inbox_control() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let mut inbox = top.take_inbox().unwrap();

        let channel = Channel::new(frame, Arc::new(MailboxTransport));
        let pending = tokio::spawn(async move { channel.send(&top, MessageKind::Init, ()).await });

        let envelope = expect_message(&mut inbox, MessageKind::Init)
            .await
            .expect("Expected Init request");
        envelope
            .respond_to
            .unwrap()
            .send(Ok(json!("hello")))
            .unwrap();

        assert_eq!(pending.await.unwrap(), Ok(json!("hello")));
    }
}
