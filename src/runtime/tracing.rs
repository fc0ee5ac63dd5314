//! # Observability & Tracing
//!
//! Every lifecycle transition, handler dispatch, cascade trigger and swallowed failure
//! is logged through `tracing` with structured fields, `tag` (the component's tag) and
//! `context` (a `ctx-N` id) being the common ones.
//!
//! ## Configuration
//!
//! Verbosity comes from `RUST_LOG`. Without it, this crate logs at `info` and
//! everything else is silent. The format is compact and hides module paths.
//!
//! ```bash
//! # Lifecycle only (default)
//! cargo run
//!
//! # Every message sent, emitted and dispatched
//! RUST_LOG=frame_link=debug cargo run
//! ```
//!
//! ## Example Trace
//!
//! A component that completes its handshake, gets one update and is closed by its
//! container (`RUST_LOG=frame_link=debug`):
//!
//! ```text
//! INFO Topology resolved tag="card" context=ctx-2 container=ctx-1 owner=ctx-1 sibling=None
//! INFO init{tag=card}: Sending init tag="card" owner=ctx-1
//! INFO Listening context=ctx-2
//! INFO init{tag=card}: Ready tag="card" context_kind=Iframe
//! DEBUG Dispatch context=ctx-2 source=ctx-1 kind=frame_link_props
//! DEBUG Props update tag="card" keys=1
//! DEBUG Dispatch context=ctx-2 source=ctx-1 kind=frame_link_close
//! INFO Closing tag="card" exit=Await
//! INFO Closed tag="card"
//! ```

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "frame_link=info";

/// Installs the global subscriber.
///
/// # Panics
/// If a global subscriber is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but returns an error when a subscriber is already
/// installed. Handy in tests, where every test may try.
pub fn try_setup_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .try_init()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
