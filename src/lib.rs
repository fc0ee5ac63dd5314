//! # Frame Link
//!
//! > **Lifecycle and messaging for components running in embedded execution contexts.**
//!
//! A component rendered inside a frame or popup has to find the context that owns it,
//! shake hands with it, keep its properties in sync with what the owner pushes, and go
//! away cleanly when either side does. This crate implements the component side of
//! that protocol on top of Tokio.
//!
//! ## 🏗️ Design
//!
//! ### Topology first
//! Attaching a component resolves, synchronously and exactly once, which context
//! embeds the current one (the *direct container*) and which context the component
//! talks to (the *logical owner*). They differ when a sibling frame rendered the
//! component; the name string of the context says which one.
//!
//! ### One control flow per context
//! Each context has an inbox. A [`Channel`](channel::Channel) drains it in one task and
//! runs handlers one at a time, so messages from a sender are handled in order and no
//! handler needs to worry about another running concurrently.
//!
//! ### Errors are events after construction
//! [`attach`](component::EmbeddedComponent::attach) returns topology errors to the
//! caller. Everything later (a failed handshake, a failing callback, the container
//! closing) ends up in the `on_error` / `on_close` callbacks, because there is no
//! caller left to return it to.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. Contexts ([`context`])
//! The in-process host: [`ContextHandle`](context::ContextHandle) with parents, frames,
//! popups, inboxes and termination, plus the per-context
//! [`AttachmentRegistry`](context::AttachmentRegistry).
//!
//! ### 2. Topology ([`topology`])
//! [`EmbedName`](topology::EmbedName) decodes the name string;
//! [`resolve`](topology::resolve) produces the [`Topology`](topology::Topology).
//!
//! ### 3. Messaging ([`channel`])
//! Request/reply and one-way messages over a [`Transport`](channel::Transport), with a
//! handler table keyed by sender and [`MessageKind`](channel::MessageKind).
//!
//! ### 4. The Component ([`component`])
//! [`EmbeddedComponent`](component::EmbeddedComponent): the lifecycle, the property
//! store, the close cascade and the command facade.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo: a container and an embedded component talking
//! RUST_LOG=frame_link=debug cargo run
//! ```
//!
//! ## 🧪 Testing
//!
//! See [`channel::mock`] for a scripted container you can drive from tests.

pub mod channel;
pub mod component;
pub mod context;
pub mod error;
pub mod runtime;
pub mod topology;
