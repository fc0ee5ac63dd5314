//! # Execution Contexts
//!
//! An execution context is an isolated unit that runs component logic and exchanges
//! asynchronous messages with other contexts: an embedded frame, a popup, or the
//! top-level context that hosts them.
//!
//! - [`ContextHandle`] - opaque, identity-compared reference to a context
//! - [`AttachmentRegistry`] - the per-context "a component lives here" marker
//! - [`ContextKind`] - how the component was rendered, as reported by its owner

pub mod handle;
pub mod registry;

pub use handle::*;
pub use registry::*;

use serde::{Deserialize, Serialize};

/// How the owner rendered the component.
///
/// Only the close cascade looks at this: a frame is destroyed together with its
/// container, a popup outlives its opener and must close itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Iframe,
    Popup,
}
