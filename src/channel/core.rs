//! # Messaging Channel
//!
//! The channel is the only way a context talks to another one. It has two halves:
//!
//! - **Outbound**: [`Channel::send`] issues a request and awaits the reply,
//!   [`Channel::emit`] posts a one-way message. Both go through a [`Transport`].
//! - **Inbound**: [`Channel::listen`] drains the local context's inbox in a background
//!   task and dispatches each envelope to the handler registered for its
//!   `(source context, message kind)` pair.
//!
//! ## Ordering
//!
//! The dispatch loop processes one envelope at a time and awaits its handler before
//! taking the next, so messages from one sender are handled in the order they were
//! delivered. Nothing is promised across different senders.
//!
//! ## Failure isolation
//!
//! A handler that returns an error, or panics, does not take the loop down. The
//! failure is logged, passed to the error hook, and turned into an error reply for
//! the sender's pending request. The next envelope is handled normally.

use crate::channel::message::{Envelope, Message, MessageKind};
use crate::context::{ContextHandle, ContextId};
use crate::error::{panic_message, ChannelError, ComponentError};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub type HandlerFuture = BoxFuture<'static, Result<Value, ComponentError>>;
pub type Handler = Arc<dyn Fn(Message) -> HandlerFuture + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&ComponentError) + Send + Sync>;

/// Delivers messages between contexts.
///
/// A request resolves with the receiver's reply, or fails with a [`ChannelError`] when
/// the target is gone, never answers, or answers with an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        source: &ContextHandle,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<Value, ChannelError>;

    fn post(
        &self,
        source: &ContextHandle,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<(), ChannelError>;
}

/// Transport for contexts living in one process: envelopes go straight into the
/// target's inbox and replies come back on a oneshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MailboxTransport;

#[async_trait]
impl Transport for MailboxTransport {
    async fn request(
        &self,
        source: &ContextHandle,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<Value, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        target.deliver(Envelope {
            source: source.clone(),
            kind,
            payload,
            respond_to: Some(respond_to),
        })?;
        response.await.map_err(|_| ChannelError::NoReply)?
    }

    fn post(
        &self,
        source: &ContextHandle,
        target: &ContextHandle,
        kind: MessageKind,
        payload: Value,
    ) -> Result<(), ChannelError> {
        target.deliver(Envelope {
            source: source.clone(),
            kind,
            payload,
            respond_to: None,
        })
    }
}

/// Request/reply messaging on behalf of one local context.
///
/// Cloning is cheap; clones share the handler table.
#[derive(Clone)]
pub struct Channel {
    local: ContextHandle,
    transport: Arc<dyn Transport>,
    handlers: Arc<RwLock<HashMap<(ContextId, MessageKind), Handler>>>,
    error_hook: Option<ErrorHook>,
}

impl Channel {
    pub fn new(local: ContextHandle, transport: Arc<dyn Transport>) -> Self {
        Self {
            local,
            transport,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            error_hook: None,
        }
    }

    /// Called with every handler failure before it is turned into an error reply.
    pub fn with_error_hook(mut self, hook: impl Fn(&ComponentError) + Send + Sync + 'static) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn local(&self) -> &ContextHandle {
        &self.local
    }

    /// Sends a request to `target` and waits for its reply.
    #[instrument(skip(self, target, payload), fields(local = %self.local.id(), target = %target.id()))]
    pub async fn send(
        &self,
        target: &ContextHandle,
        kind: MessageKind,
        payload: impl Serialize,
    ) -> Result<Value, ChannelError> {
        let payload = serde_json::to_value(payload)?;
        debug!("Sending request");
        self.transport
            .request(&self.local, target, kind, payload)
            .await
    }

    /// Posts a one-way message. Returns once the message is handed to the transport.
    pub fn emit(
        &self,
        target: &ContextHandle,
        kind: MessageKind,
        payload: impl Serialize,
    ) -> Result<(), ChannelError> {
        let payload = serde_json::to_value(payload)?;
        debug!(local = %self.local.id(), target = %target.id(), %kind, "Emit");
        self.transport.post(&self.local, target, kind, payload)
    }

    /// Routes `kind` messages from `source` to `handler`, replacing any previous handler.
    pub fn register_handler<F, Fut>(&self, source: &ContextHandle, kind: MessageKind, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ComponentError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |message| handler(message).boxed());
        self.handlers.write().insert((source.id(), kind), handler);
        debug!(local = %self.local.id(), source = %source.id(), %kind, "Handler registered");
    }

    pub fn clear_handlers(&self) {
        self.handlers.write().clear();
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Starts the dispatch loop for the local context's inbox.
    ///
    /// Fails with `AlreadyListening` if someone else already owns the inbox.
    /// Dropping the returned [`Listener`] stops the loop.
    pub fn listen(&self) -> Result<Listener, ChannelError> {
        let inbox = self
            .local
            .take_inbox()
            .ok_or(ChannelError::AlreadyListening(self.local.id()))?;
        let handle = tokio::spawn(self.clone().dispatch(inbox));
        Ok(Listener { handle })
    }

    async fn dispatch(self, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        let local = self.local.id();
        let mut closed = self.local.subscribe_closed();
        if *closed.borrow_and_update() {
            return;
        }
        info!(context = %local, "Listening");

        loop {
            tokio::select! {
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
                _ = closed.changed() => break,
            }
        }

        info!(context = %local, "Stopped listening");
    }

    async fn handle(&self, envelope: Envelope) {
        let Envelope {
            source,
            kind,
            payload,
            respond_to,
        } = envelope;

        let handler = self.handlers.read().get(&(source.id(), kind)).cloned();
        let Some(handler) = handler else {
            debug!(context = %self.local.id(), source = %source.id(), %kind, "No handler, ignored");
            return;
        };

        debug!(context = %self.local.id(), source = %source.id(), %kind, "Dispatch");
        let message = Message {
            source,
            kind,
            payload,
        };
        let result = match AssertUnwindSafe(async move { handler(message).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ComponentError::HandlerFailed {
                kind: kind.as_str(),
                reason: panic_message(panic.as_ref()),
            }),
        };

        if let Err(e) = &result {
            warn!(context = %self.local.id(), %kind, error = %e, "Handler failed");
            if let Some(hook) = &self.error_hook {
                hook(e);
            }
        }

        if let Some(respond_to) = respond_to {
            let _ = respond_to.send(result.map_err(|e| ChannelError::Remote(e.to_string())));
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("local", &self.local.id())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Running dispatch loop. Stops when dropped.
#[derive(Debug)]
pub struct Listener {
    handle: JoinHandle<()>,
}

impl Listener {
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockPeer;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(1);

    fn explode() -> Result<Value, ComponentError> {
        panic!("redirect exploded")
    }

    fn channel_for(ctx: &ContextHandle) -> Channel {
        Channel::new(ctx.clone(), Arc::new(MailboxTransport))
    }

    #[tokio::test]
    async fn request_reaches_registered_handler() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let peer = MockPeer::new(&top);

        let channel = channel_for(&frame);
        channel.register_handler(&top, MessageKind::Init, |message| async move {
            Ok(json!({ "echo": message.payload }))
        });
        let _listener = channel.listen().unwrap();

        let reply = tokio::time::timeout(WAIT, peer.request(&frame, MessageKind::Init, json!(7)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, json!({ "echo": 7 }));
    }

    #[tokio::test]
    async fn handlers_are_keyed_by_source() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let stranger = ContextHandle::top_level("stranger");
        let stranger_peer = MockPeer::new(&stranger);

        let channel = channel_for(&frame);
        channel.register_handler(&top, MessageKind::Init, |_| async { Ok(json!("ok")) });
        let _listener = channel.listen().unwrap();

        // Unhandled requests are dropped, so the sender sees no reply.
        let result = tokio::time::timeout(
            WAIT,
            stranger_peer.request(&frame, MessageKind::Init, Value::Null),
        )
        .await
        .unwrap();
        assert_eq!(result, Err(ChannelError::NoReply));
    }

    #[tokio::test]
    async fn failing_handler_replies_with_error_and_keeps_listening() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let peer = MockPeer::new(&top);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let channel = {
            let seen = seen.clone();
            channel_for(&frame).with_error_hook(move |e| seen.lock().push(e.clone()))
        };
        channel.register_handler(&top, MessageKind::Init, |_| async {
            Err(ComponentError::NotAttached)
        });
        channel.register_handler(&top, MessageKind::Redirect, |_| async { explode() });
        channel.register_handler(&top, MessageKind::Props, |_| async { Ok(json!("fine")) });
        let _listener = channel.listen().unwrap();

        let failed = peer.request(&frame, MessageKind::Init, Value::Null).await;
        assert_eq!(
            failed,
            Err(ChannelError::Remote(ComponentError::NotAttached.to_string()))
        );

        let panicked = peer.request(&frame, MessageKind::Redirect, Value::Null).await;
        assert!(matches!(panicked, Err(ChannelError::Remote(reason)) if reason.contains("redirect exploded")));

        let ok = tokio::time::timeout(WAIT, peer.request(&frame, MessageKind::Props, Value::Null))
            .await
            .unwrap();
        assert_eq!(ok, Ok(json!("fine")));
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn one_way_messages_are_handled_in_order() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let peer = MockPeer::new(&top);

        let order = Arc::new(Mutex::new(Vec::new()));
        let channel = channel_for(&frame);
        {
            let order = order.clone();
            channel.register_handler(&top, MessageKind::Props, move |message| {
                let order = order.clone();
                async move {
                    tokio::task::yield_now().await;
                    order.lock().push(message.payload);
                    Ok(Value::Null)
                }
            });
        }
        let _listener = channel.listen().unwrap();

        for i in 0..5 {
            peer.post(&frame, MessageKind::Props, json!(i)).unwrap();
        }
        // A request queued behind the posts resolves only after they were handled.
        channel.register_handler(&top, MessageKind::Init, |_| async { Ok(Value::Null) });
        peer.request(&frame, MessageKind::Init, Value::Null).await.unwrap();

        assert_eq!(*order.lock(), vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn second_listener_is_rejected() {
        let ctx = ContextHandle::top_level("ctx");
        let channel = channel_for(&ctx);
        let _listener = channel.listen().unwrap();
        assert_eq!(
            channel.listen().unwrap_err(),
            ChannelError::AlreadyListening(ctx.id())
        );
    }

    #[tokio::test]
    async fn closed_target_fails_fast() {
        let top = ContextHandle::top_level("top");
        let frame = top.open_frame("frame");
        let channel = channel_for(&frame);
        top.close();

        assert_eq!(
            channel.emit(&top, MessageKind::Close, Value::Null),
            Err(ChannelError::ContextClosed(top.id()))
        );
        assert_eq!(
            channel.send(&top, MessageKind::Init, Value::Null).await,
            Err(ChannelError::ContextClosed(top.id()))
        );
    }

    #[tokio::test]
    async fn listener_stops_when_local_context_closes() {
        let ctx = ContextHandle::top_level("ctx");
        let listener = channel_for(&ctx).listen().unwrap();
        ctx.close();
        tokio::time::timeout(WAIT, async {
            while !listener.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
