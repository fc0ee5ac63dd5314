//! # Embedded Component
//!
//! The component side of the protocol. An [`EmbeddedComponent`] lives inside an
//! embedded context and drives this lifecycle:
//!
//! ```text
//! Uninitialized -> Resolving -> Handshaking -> Ready -> Closing -> Closed
//! ```
//!
//! - [`attach`](EmbeddedComponent::attach) resolves the topology synchronously. In
//!   standalone mode a context that was not embedded yields an inert component that
//!   stays `Uninitialized`.
//! - [`init`](EmbeddedComponent::init) arms the `Props`/`Close` handlers, sends `Init`
//!   to the owner, seeds the property store, runs `on_enter` then `on_props`, and arms
//!   the close cascade. It runs once; every caller gets the same outcome.
//! - `Props` from the container or owner merge into the store while `Ready`.
//! - `Close` from the direct container closes the component. `Close` from anyone else
//!   is forwarded to the direct container and otherwise ignored.
//! - The container or owner terminating closes the component through the cascade.
//!
//! ```rust
//! use frame_link::channel::mock::{init_reply, MockPeer};
//! use frame_link::channel::MessageKind;
//! use frame_link::component::{ComponentOptions, EmbeddedComponent, Environment, LifecyclePhase};
//! use frame_link::context::{ContextHandle, ContextKind};
//! use frame_link::topology::EmbedName;
//!
//! #[tokio::main]
//! async fn main() {
//!     let top = ContextHandle::top_level("top");
//!     let frame = top.open_frame(EmbedName::new("card").encode());
//!
//!     let mut owner = MockPeer::new(&top);
//!     owner
//!         .expect_request(MessageKind::Init)
//!         .return_ok(init_reply(ContextKind::Iframe, Default::default()));
//!
//!     let component =
//!         EmbeddedComponent::attach(&frame, &Environment::default(), ComponentOptions::new()).unwrap();
//!     component.init().await.unwrap();
//!     assert_eq!(component.phase(), LifecyclePhase::Ready);
//! }
//! ```

pub mod cascade;
pub mod commands;
pub mod options;
pub mod props;

pub use cascade::CascadeMonitor;
pub use options::*;
pub use props::*;

use crate::channel::{
    Channel, InitReply, Listener, MailboxTransport, Message, MessageKind, PropsUpdate, Transport,
};
use crate::context::{AttachmentRegistry, ContextHandle, ContextKind};
use crate::error::{ChannelError, ComponentError};
use crate::topology::{resolve, Topology};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn, Instrument};

/// Collaborators a component is attached with.
#[derive(Clone)]
pub struct Environment {
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<AttachmentRegistry>,
}

impl Environment {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<AttachmentRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }
}

impl Default for Environment {
    /// In-process mailbox transport and a fresh registry.
    fn default() -> Self {
        Self::new(Arc::new(MailboxTransport), Arc::new(AttachmentRegistry::new()))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Uninitialized,
    Resolving,
    Handshaking,
    Ready,
    Closing,
    Closed,
}

/// What happens to the current context once the close callback ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Termination proceeds externally.
    Await,
    /// A popup closes itself; a frame goes down with its container anyway.
    CloseIfPopup,
    /// Ask for termination: popups close themselves, frames ask the container.
    Request,
}

struct Shared {
    tag: String,
    current: ContextHandle,
    topology: Option<Topology>,
    channel: Option<Channel>,
    props: PropertyStore,
    callbacks: Callbacks,
    phase: Mutex<LifecyclePhase>,
    context_kind: Mutex<Option<ContextKind>>,
    started: AtomicBool,
    // Set once when the handshake task finishes. `init` callers and Props handlers wait on it.
    outcome: watch::Sender<Option<Result<(), ComponentError>>>,
    listener: Mutex<Option<Listener>>,
    monitor: Mutex<Option<CascadeMonitor>>,
}

/// Component instance bound to one embedded context. Clones share the instance.
#[derive(Clone)]
pub struct EmbeddedComponent {
    shared: Arc<Shared>,
}

impl EmbeddedComponent {
    /// Attaches a component to `current`.
    ///
    /// Topology errors, `AlreadyAttached` included, fail the call unless the options
    /// ask for standalone mode. A standalone component that could not resolve is
    /// inert: `init` succeeds without traffic and the properties are just the defaults.
    pub fn attach(
        current: &ContextHandle,
        env: &Environment,
        options: ComponentOptions,
    ) -> Result<Self, ComponentError> {
        let (settings, callbacks) = options.into_parts();

        let topology = match resolve(current, &env.registry) {
            Ok(topology) => Some(topology),
            Err(e) if settings.standalone => {
                info!(context = %current.id(), reason = %e, "No owner, running standalone");
                None
            }
            Err(e) => return Err(e),
        };

        let tag = topology
            .as_ref()
            .map(|t| t.tag.clone())
            .unwrap_or_else(|| current.name().to_string());

        let channel = topology.as_ref().map(|_| {
            let callbacks = callbacks.clone();
            Channel::new(current.clone(), env.transport.clone())
                .with_error_hook(move |e| callbacks.error(e))
        });

        let props = {
            let callbacks = callbacks.clone();
            PropertyStore::new(settings.default_props)
                .with_change_hook(move |props| callbacks.props_changed(props))
        };

        let phase = if topology.is_some() {
            LifecyclePhase::Resolving
        } else {
            LifecyclePhase::Uninitialized
        };

        Ok(Self {
            shared: Arc::new(Shared {
                tag,
                current: current.clone(),
                topology,
                channel,
                props,
                callbacks,
                phase: Mutex::new(phase),
                context_kind: Mutex::new(None),
                started: AtomicBool::new(false),
                outcome: watch::channel(None).0,
                listener: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
        })
    }

    /// Runs the handshake with the owner, once.
    ///
    /// The first call spawns the handshake as its own task, so dropping the returned
    /// future (a timeout, say) does not cancel it. Resolves after `on_enter` and the
    /// first `on_props` have run. Concurrent and later callers get the outcome of the
    /// first run. A failed handshake is reported to `on_error` and is final.
    #[instrument(skip(self), fields(tag = %self.shared.tag))]
    pub async fn init(&self) -> Result<(), ComponentError> {
        if !self.shared.started.swap(true, Ordering::AcqRel) {
            let shared = self.shared.clone();
            tokio::spawn(
                async move {
                    let outcome = shared.clone().handshake().await;
                    shared.outcome.send_replace(Some(outcome));
                }
                .in_current_span(),
            );
        }
        self.shared.settled().await
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.shared.phase.lock()
    }

    /// Snapshot of the current properties.
    pub fn props(&self) -> Props {
        self.shared.props.snapshot()
    }

    pub fn prop(&self, key: &str) -> Option<Value> {
        self.shared.props.get(key)
    }

    /// How the owner rendered the component. Known once `Ready`.
    pub fn context_kind(&self) -> Option<ContextKind> {
        *self.shared.context_kind.lock()
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.shared.topology.as_ref()
    }

    pub fn is_standalone(&self) -> bool {
        self.shared.topology.is_none()
    }

    pub fn tag(&self) -> &str {
        &self.shared.tag
    }

    pub fn current(&self) -> &ContextHandle {
        &self.shared.current
    }

    /// Closes the component: runs `on_close` and asks for the context to be
    /// terminated. Does nothing if already closing, or in standalone mode.
    pub fn close(&self) {
        if self.is_standalone() {
            return;
        }
        self.shared.teardown(None, Exit::Request);
    }
}

impl fmt::Debug for EmbeddedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedComponent")
            .field("tag", &self.shared.tag)
            .field("context", &self.shared.current.id())
            .field("phase", &self.phase())
            .field("context_kind", &self.context_kind())
            .finish()
    }
}

impl Shared {
    async fn handshake(self: Arc<Self>) -> Result<(), ComponentError> {
        let (Some(topology), Some(channel)) = (&self.topology, &self.channel) else {
            debug!(tag = %self.tag, "Standalone, no handshake");
            return Ok(());
        };

        {
            let mut phase = self.phase.lock();
            if *phase != LifecyclePhase::Resolving {
                return Err(ComponentError::NotAttached);
            }
            *phase = LifecyclePhase::Handshaking;
        }

        // Handlers go in before Init is sent so no update can slip past.
        self.arm_handlers(topology, channel);
        match channel.listen() {
            Ok(listener) => *self.listener.lock() = Some(listener),
            Err(e) => return self.fail_handshake(e),
        }

        info!(tag = %self.tag, owner = %topology.logical_owner.id(), "Sending init");
        let reply = channel
            .send(&topology.logical_owner, MessageKind::Init, ())
            .await
            .and_then(|reply| serde_json::from_value::<InitReply>(reply).map_err(ChannelError::from));
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return self.fail_handshake(e),
        };

        {
            let mut phase = self.phase.lock();
            if *phase != LifecyclePhase::Handshaking {
                debug!(tag = %self.tag, phase = ?*phase, "Closed during handshake");
                return Err(ComponentError::NotAttached);
            }
            *self.context_kind.lock() = Some(reply.context);
            *phase = LifecyclePhase::Ready;
        }
        info!(tag = %self.tag, context_kind = ?reply.context, "Ready");

        self.props.apply(reply.props);
        self.callbacks.enter();
        self.props.notify();
        self.arm_cascade(topology);
        Ok(())
    }

    /// Waits for the handshake task's outcome.
    async fn settled(&self) -> Result<(), ComponentError> {
        let mut outcome = self.outcome.subscribe();
        loop {
            let current = outcome.borrow_and_update().clone();
            if let Some(result) = current {
                return result;
            }
            if outcome.changed().await.is_err() {
                return Err(ComponentError::NotAttached);
            }
        }
    }

    fn fail_handshake(&self, reason: impl fmt::Display) -> Result<(), ComponentError> {
        let error = ComponentError::HandshakeFailed {
            tag: self.tag.clone(),
            reason: reason.to_string(),
        };
        warn!(tag = %self.tag, %error, "Handshake failed");
        self.disarm();
        self.callbacks.error(&error);
        Err(error)
    }

    /// `Props` and `Close` from the direct container, and from the owner if distinct.
    fn arm_handlers(self: &Arc<Self>, topology: &Topology, channel: &Channel) {
        let mut sources = vec![&topology.direct_container];
        if !topology.owner_is_container() {
            sources.push(&topology.logical_owner);
        }

        for source in sources {
            let weak = Arc::downgrade(self);
            channel.register_handler(source, MessageKind::Props, move |message| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(shared) => shared.on_props_message(message).await,
                        None => Ok(Value::Null),
                    }
                }
            });

            let weak = Arc::downgrade(self);
            channel.register_handler(source, MessageKind::Close, move |message| {
                let weak = weak.clone();
                async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_close_message(&message);
                    }
                    Ok(Value::Null)
                }
            });
        }
    }

    async fn on_props_message(&self, message: Message) -> Result<Value, ComponentError> {
        // Held back until the handshake settles; only a Ready component merges.
        let _ = self.settled().await;
        if *self.phase.lock() != LifecyclePhase::Ready {
            debug!(tag = %self.tag, "Props while not ready, ignored");
            return Ok(Value::Null);
        }

        let update: PropsUpdate = message.decode()?;
        debug!(tag = %self.tag, keys = update.props.len(), "Props update");
        self.props.merge(update.props);
        Ok(Value::Null)
    }

    fn on_close_message(&self, message: &Message) {
        let Some(topology) = &self.topology else {
            return;
        };

        if message.source != topology.direct_container {
            // Forwarded without waiting: the container may terminate us before we
            // could take an acknowledgment.
            info!(tag = %self.tag, from = %message.source.id(), "Forwarding close to container");
            self.emit_close(topology);
            return;
        }

        self.teardown(None, Exit::Await);
    }

    fn arm_cascade(self: &Arc<Self>, topology: &Topology) {
        let on_container_closed = {
            let weak = Arc::downgrade(self);
            let tag = self.tag.clone();
            move || {
                upgrade_then(&weak, |shared| {
                    shared.teardown(Some(ComponentError::ContainerClosed(tag)), Exit::CloseIfPopup)
                })
            }
        };
        let on_owner_closed = {
            let weak = Arc::downgrade(self);
            let tag = self.tag.clone();
            move || {
                upgrade_then(&weak, |shared| {
                    shared.teardown(Some(ComponentError::OwnerClosed(tag)), Exit::Request)
                })
            }
        };
        let monitor = CascadeMonitor::arm(topology, on_container_closed, on_owner_closed);
        *self.monitor.lock() = Some(monitor);
    }

    /// Moves to `Closing`, runs `on_close` once, acts on `exit`, and ends in `Closed`.
    fn teardown(&self, reason: Option<ComponentError>, exit: Exit) {
        {
            let mut phase = self.phase.lock();
            if matches!(*phase, LifecyclePhase::Closing | LifecyclePhase::Closed) {
                return;
            }
            *phase = LifecyclePhase::Closing;
        }
        match &reason {
            Some(reason) => info!(tag = %self.tag, %reason, ?exit, "Closing"),
            None => info!(tag = %self.tag, ?exit, "Closing"),
        }

        self.callbacks.close(reason.as_ref());
        match exit {
            Exit::Await => {}
            Exit::CloseIfPopup => {
                if *self.context_kind.lock() == Some(ContextKind::Popup) {
                    self.current.close();
                }
            }
            Exit::Request => self.request_termination(),
        }

        self.disarm();
        *self.phase.lock() = LifecyclePhase::Closed;
        info!(tag = %self.tag, "Closed");
    }

    fn request_termination(&self) {
        if *self.context_kind.lock() == Some(ContextKind::Popup) {
            self.current.close();
        } else if let Some(topology) = &self.topology {
            self.emit_close(topology);
        }
    }

    fn emit_close(&self, topology: &Topology) {
        let Some(channel) = &self.channel else {
            return;
        };
        if let Err(e) = channel.emit(&topology.direct_container, MessageKind::Close, ()) {
            warn!(tag = %self.tag, error = %e, "Could not send close to container");
        }
    }

    /// Drops handlers, the dispatch loop, and the cascade observers.
    fn disarm(&self) {
        if let Some(channel) = &self.channel {
            channel.clear_handlers();
        }
        let listener = self.listener.lock().take();
        drop(listener);
        let monitor = self.monitor.lock().take();
        drop(monitor);
    }
}

fn upgrade_then(weak: &Weak<Shared>, f: impl FnOnce(Arc<Shared>)) {
    if let Some(shared) = weak.upgrade() {
        f(shared);
    }
}
