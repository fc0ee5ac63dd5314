//! Messaging between execution contexts.
//!
//! # Main Components
//!
//! - [`Channel`] - request/reply and one-way messaging for one local context, plus the
//!   handler table consulted for inbound messages
//! - [`Transport`] - the delivery primitive underneath; [`MailboxTransport`] for
//!   contexts in the same process
//! - [`MessageKind`] and the payload types in [`message`]
//!
//! # Testing
//!
//! See [`mock`] for a scripted peer that plays the container side.

pub mod core;
pub mod message;
pub mod mock;

pub use self::core::*;
pub use message::*;
