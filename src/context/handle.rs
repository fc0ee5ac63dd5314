//! # Context Handles
//!
//! [`ContextHandle`] is the in-process host for execution contexts. It models just
//! enough of a windowing platform for the protocol to run on: a parent link, a list of
//! named child frames, a name string, an inbox for messages, and a termination signal
//! that observers can subscribe to.
//!
//! Handles compare by identity. Two clones of one handle are equal; two contexts with
//! the same name are not.

use crate::channel::Envelope;
use crate::error::ChannelError;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::debug;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a context, used for logging and lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Where a context sits relative to the context that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    TopLevel,
    Frame,
    Popup,
}

/// How a closed context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// [`ContextHandle::close`] was called on the context itself.
    SelfClosed,
    /// The context was a frame and its container closed.
    WithContainer,
}

/// Visible surface state changed by focus and resize commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Surface {
    pub focused: bool,
    pub size: Option<(u32, u32)>,
}

struct ContextCell {
    id: ContextId,
    placement: Placement,
    name: String,
    parent: Option<ContextHandle>,
    frames: RwLock<Vec<Weak<ContextCell>>>,
    location: RwLock<String>,
    surface: Mutex<Surface>,
    termination: Mutex<Option<Termination>>,
    closed: watch::Sender<bool>,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
}

/// Non-owning reference to an execution context.
#[derive(Clone)]
pub struct ContextHandle {
    cell: Arc<ContextCell>,
}

impl ContextHandle {
    fn new(placement: Placement, name: String, parent: Option<ContextHandle>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let cell = ContextCell {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            placement,
            name,
            parent,
            frames: RwLock::new(Vec::new()),
            location: RwLock::new("about:blank".to_string()),
            surface: Mutex::new(Surface::default()),
            termination: Mutex::new(None),
            closed,
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        };
        Self {
            cell: Arc::new(cell),
        }
    }

    /// Creates a context with no parent.
    pub fn top_level(name: impl Into<String>) -> Self {
        Self::new(Placement::TopLevel, name.into(), None)
    }

    /// Creates a frame inside this context and appends it to [`frame`](Self::frame)'s index.
    pub fn open_frame(&self, name: impl Into<String>) -> Self {
        let child = Self::new(Placement::Frame, name.into(), Some(self.clone()));
        self.cell.frames.write().push(Arc::downgrade(&child.cell));
        debug!(container = %self.id(), frame = %child.id(), "Frame opened");
        child
    }

    /// Creates a popup whose opener is this context. Popups are not listed as frames.
    pub fn open_popup(&self, name: impl Into<String>) -> Self {
        let child = Self::new(Placement::Popup, name.into(), Some(self.clone()));
        debug!(opener = %self.id(), popup = %child.id(), "Popup opened");
        child
    }

    pub fn id(&self) -> ContextId {
        self.cell.id
    }

    pub fn placement(&self) -> Placement {
        self.cell.placement
    }

    /// The name string the creator assigned to this context.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// The containing frame's context, or the opener for a popup.
    pub fn parent(&self) -> Option<ContextHandle> {
        self.cell.parent.clone()
    }

    /// The `index`-th frame opened inside this context, if it still exists.
    pub fn frame(&self, index: usize) -> Option<ContextHandle> {
        self.cell
            .frames
            .read()
            .get(index)
            .and_then(Weak::upgrade)
            .map(|cell| ContextHandle { cell })
    }

    pub fn location(&self) -> String {
        self.cell.location.read().clone()
    }

    pub fn navigate(&self, url: impl Into<String>) {
        let url = url.into();
        debug!(context = %self.id(), %url, "Navigate");
        *self.cell.location.write() = url;
    }

    pub fn focus(&self) {
        self.cell.surface.lock().focused = true;
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.cell.surface.lock().size = Some((width, height));
    }

    pub fn surface(&self) -> Surface {
        *self.cell.surface.lock()
    }

    pub fn is_focused(&self) -> bool {
        self.surface().focused
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.surface().size
    }

    /// Terminates this context. Frames inside it go down with it; popups it opened do not.
    pub fn close(&self) {
        self.terminate(Termination::SelfClosed);
    }

    fn terminate(&self, how: Termination) {
        {
            let mut termination = self.cell.termination.lock();
            if termination.is_some() {
                return;
            }
            *termination = Some(how);
        }
        debug!(context = %self.id(), ?how, "Context closed");
        self.cell.closed.send_replace(true);

        let frames: Vec<ContextHandle> = self
            .cell
            .frames
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cell| ContextHandle { cell })
            .collect();
        for frame in frames {
            frame.terminate(Termination::WithContainer);
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.cell.closed.borrow()
    }

    pub fn termination(&self) -> Option<Termination> {
        *self.cell.termination.lock()
    }

    /// Watches the termination flag. The value flips to `true` exactly once.
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.cell.closed.subscribe()
    }

    /// Resolves once this context has closed.
    pub async fn closed(&self) {
        let mut rx = self.subscribe_closed();
        loop {
            let closed = *rx.borrow_and_update();
            if closed || rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Queues an envelope in this context's inbox. Fails with `NoListener` once the
    /// receiving end was taken and dropped.
    pub(crate) fn deliver(&self, envelope: Envelope) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::ContextClosed(self.id()));
        }
        self.cell
            .inbox_tx
            .send(envelope)
            .map_err(|_| ChannelError::NoListener(self.id()))
    }

    /// Hands out the receiving end of the inbox. Only the first caller gets it.
    pub fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.cell.inbox_rx.lock().take()
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for ContextHandle {}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.cell.id)
            .field("placement", &self.cell.placement)
            .field("closed", &self.is_closed())
            .finish()
    }
}
