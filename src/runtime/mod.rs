//! Process-level setup.
//!
//! - [`setup_tracing`] / [`try_setup_tracing`] - install the log subscriber

pub mod tracing;

pub use self::tracing::*;
