//! Who embeds the current context, and who owns the component running in it.
//!
//! Usually the two are the same context. In the sibling-rendered case a frame of the
//! container rendered the component, so the owner is one hop away: the container's
//! frame at the index carried in the name string.

pub mod name;
pub mod resolver;

pub use name::*;
pub use resolver::*;
