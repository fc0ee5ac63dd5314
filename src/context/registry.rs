//! # Attachment Registry
//!
//! Records which contexts already host a component. The registry is injected into
//! [`resolve`](crate::topology::resolve) rather than kept as process-wide state, so
//! tests can start from a clean slate.

use crate::context::{ContextHandle, ContextId};
use crate::error::ComponentError;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Set of contexts that carry a component instance marker.
#[derive(Debug, Default)]
pub struct AttachmentRegistry {
    attached: Mutex<HashSet<ContextId>>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `context` as hosting a component.
    ///
    /// Check and insert happen under one lock, so of two racing callers exactly one
    /// succeeds. The loser gets `AlreadyAttached` and nothing is changed.
    pub fn try_attach(&self, context: &ContextHandle) -> Result<(), ComponentError> {
        if self.attached.lock().insert(context.id()) {
            Ok(())
        } else {
            Err(ComponentError::AlreadyAttached(context.id()))
        }
    }

    pub fn is_attached(&self, context: &ContextHandle) -> bool {
        self.attached.lock().contains(&context.id())
    }
}
